//! Tests for set counting, per-chunk sizes and the 4-byte block flip

mod common;

use common::*;
use uvdm_lib::chunk::{chunk_count, chunk_data_size, chunk_plan, flip, unflip};

#[test]
fn test_chunk_count_boundaries() {
    let cases = [
        (2, 1),
        (12, 1),
        (13, 2),
        (28, 2),
        (29, 3),
        (30, 3),
        (44, 3),
        (45, 4),
        (236, 15),
        (237, 16),
        (255, 17),
    ];
    for (size, expected) in cases {
        assert_eq!(chunk_count(size), expected, "chunk_count({})", size);
    }
}

#[test]
fn test_chunk_plan_examples() {
    assert_eq!(chunk_plan(30), vec![12, 16, 2]);
    assert_eq!(chunk_plan(28), vec![12, 16]);
    assert_eq!(chunk_plan(12), vec![12]);
    assert_eq!(chunk_plan(5), vec![5]);
}

#[test]
fn test_no_chunk_is_empty() {
    for size in 2..=MAX_INPUT_DATA {
        assert!(
            chunk_plan(size).iter().all(|&cur| cur > 0),
            "size {} produced an empty set: {:?}",
            size,
            chunk_plan(size)
        );
    }
}

#[test]
fn test_chunk_data_size_caps() {
    assert_eq!(chunk_data_size(true, 100), SEC_UVDM_MAXDATA_FIRST);
    assert_eq!(chunk_data_size(false, 100), SEC_UVDM_MAXDATA_NORMAL);
    assert_eq!(chunk_data_size(false, 3), 3);
}

#[test]
fn test_flip_length_is_aligned() {
    for size in 1..=MAX_INPUT_DATA {
        let data = counting(size);
        let flipped = flip(&data);
        assert_eq!(flipped.len() % SEC_UVDM_ALIGN, 0, "size {}", size);
        assert!(flipped.len() >= size && flipped.len() < size + SEC_UVDM_ALIGN);
    }
}

#[test]
fn test_unflip_restores_input() {
    for size in 1..=MAX_INPUT_DATA {
        let data = counting(size);
        assert_eq!(unflip(&flip(&data), size), data, "size {}", size);
    }
}

#[test]
fn test_unflip_ignores_trailing_window_padding() {
    // The receiver stages whole 16-byte windows, so the staged buffer is
    // longer than the flipped payload.
    let data = counting(30);
    let mut staged = flip(&data);
    staged.resize(12 + 16 + 16, 0);
    assert_eq!(unflip(&staged, 30), data);
}
