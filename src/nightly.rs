/// Hints to the compiler that this code path is cold (unlikely to be executed).
///
/// This can help the compiler make better optimization decisions by moving
/// cold code out of the hot path.
#[cold]
#[inline(always)]
pub const fn cold_path() {}

/// Hints to the compiler that the condition is unlikely to be true.
#[inline(always)]
pub const fn unlikely(b: bool) -> bool {
    if b {
        cold_path();
    }
    b
}
