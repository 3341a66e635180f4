use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use zero_mysql_codec::codec::DecodeContext;
use zero_mysql_codec::constant::ColumnType;
use zero_mysql_codec::protocol::column_definition::{ColumnDefinition, ColumnDefinitions};
use zero_mysql_codec::protocol::primitive::write_bytes_lenenc;
use zero_mysql_codec::{Protocol, Row};

const COLUMNS: usize = 16;

fn columns() -> Arc<ColumnDefinitions> {
    let defs = (0..COLUMNS)
        .map(|i| match i % 4 {
            0 => ColumnDefinition::new(format!("c{i}"), ColumnType::MYSQL_TYPE_LONGLONG),
            1 => ColumnDefinition::new(format!("c{i}"), ColumnType::MYSQL_TYPE_VAR_STRING),
            2 => ColumnDefinition::new(format!("c{i}"), ColumnType::MYSQL_TYPE_DOUBLE),
            _ => ColumnDefinition::new(format!("c{i}"), ColumnType::MYSQL_TYPE_DATETIME),
        })
        .collect();
    Arc::new(ColumnDefinitions::new(defs))
}

fn text_payload() -> Vec<u8> {
    let mut payload = Vec::new();
    for i in 0..COLUMNS {
        let value = match i % 4 {
            0 => format!("{}", i * 1_000_003),
            1 => format!("user-{i}@example.com"),
            2 => format!("{}.25", i),
            _ => "2024-05-06 07:08:09.123456".to_owned(),
        };
        write_bytes_lenenc(&mut payload, value.as_bytes());
    }
    payload
}

fn binary_payload() -> Vec<u8> {
    // header and an all-clear NULL bitmap
    let mut payload = vec![0x00; 1 + ((COLUMNS + 9) >> 3)];
    for i in 0..COLUMNS {
        match i % 4 {
            0 => payload.extend_from_slice(&(i as i64 * 1_000_003).to_le_bytes()),
            1 => write_bytes_lenenc(&mut payload, format!("user-{i}@example.com").as_bytes()),
            2 => payload.extend_from_slice(&(i as f64 + 0.25).to_le_bytes()),
            _ => payload.extend_from_slice(&[11, 0xE8, 0x07, 5, 6, 7, 8, 9, 0x40, 0xE2, 0x01, 0]),
        }
    }
    payload
}

fn read_all(row: &mut Row) {
    for i in 0..COLUMNS {
        match i % 4 {
            0 => {
                black_box(row.get::<i64>(i).ok());
            }
            1 => {
                black_box(row.get::<String>(i).ok());
            }
            2 => {
                black_box(row.get::<f64>(i).ok());
            }
            _ => {
                black_box(row.get::<chrono::NaiveDateTime>(i).ok());
            }
        }
    }
}

fn bench_rows(c: &mut Criterion) {
    let columns = columns();
    let mut group = c.benchmark_group("row_decode");
    for (protocol, payload) in [
        (Protocol::Text, text_payload()),
        (Protocol::Binary, binary_payload()),
    ] {
        let ctx = DecodeContext::new(protocol);
        group.bench_with_input(
            BenchmarkId::new("sequential", format!("{protocol:?}")),
            &payload,
            |b, payload| {
                b.iter(|| {
                    let Ok(mut row) = Row::new(payload.clone(), Arc::clone(&columns), ctx) else {
                        return;
                    };
                    read_all(&mut row);
                });
            },
        );
        group.bench_with_input(
            BenchmarkId::new("last_then_first", format!("{protocol:?}")),
            &payload,
            |b, payload| {
                b.iter(|| {
                    let Ok(mut row) = Row::new(payload.clone(), Arc::clone(&columns), ctx) else {
                        return;
                    };
                    black_box(row.raw(COLUMNS - 1).ok().flatten().map(<[u8]>::len));
                    black_box(row.raw(0).ok().flatten().map(<[u8]>::len));
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_rows);
criterion_main!(benches);
