//! Chunking arithmetic shared by both ends of a UVDM transfer.

use crate::constants::*;

/// Reverse `src` in 4-byte blocks.
///
/// The output is `src.len()` rounded up to a multiple of 4; a trailing
/// partial block is padded with zeros before it is reversed. Applying the
/// transform twice restores the input (plus padding).
pub fn flip(src: &[u8]) -> Vec<u8> {
    let blocks = src.len().div_ceil(SEC_UVDM_ALIGN);
    let mut dest = vec![0u8; blocks * SEC_UVDM_ALIGN];

    for (i, block) in dest.chunks_exact_mut(SEC_UVDM_ALIGN).enumerate() {
        for j in 0..SEC_UVDM_ALIGN {
            let src_pos = SEC_UVDM_ALIGN * i + j;
            block[SEC_UVDM_ALIGN - j - 1] = src.get(src_pos).copied().unwrap_or(0);
        }
    }
    dest
}

/// Inverse of [`flip`], truncated to `size` bytes.
pub fn unflip(src: &[u8], size: usize) -> Vec<u8> {
    let mut out = flip(src);
    out.resize(size, 0);
    out
}

/// Number of UVDM sets needed for a long transfer of `size` bytes.
///
/// An exact multiple of 16 past the first chunk adds one set, a remainder
/// adds two, so `chunk_count(28) == 2` and `chunk_count(29) == 3`.
pub fn chunk_count(size: usize) -> usize {
    if size <= SEC_UVDM_MAXDATA_FIRST {
        return 1;
    }
    let rest = size - SEC_UVDM_MAXDATA_FIRST;
    let sets = rest / SEC_UVDM_MAXDATA_NORMAL;
    if rest % SEC_UVDM_MAXDATA_NORMAL == 0 {
        sets + 1
    } else {
        sets + 2
    }
}

/// Payload bytes carried by the next chunk given what is left to send.
pub fn chunk_data_size(first: bool, remaining: usize) -> usize {
    let max = if first { SEC_UVDM_MAXDATA_FIRST } else { SEC_UVDM_MAXDATA_NORMAL };
    remaining.min(max)
}

/// Per-chunk payload sizes for a long transfer, in send order.
pub fn chunk_plan(size: usize) -> Vec<usize> {
    let mut remaining = size;
    (0..chunk_count(size))
        .map(|i| {
            let cur = chunk_data_size(i == 0, remaining);
            remaining -= cur;
            cur
        })
        .collect()
}

/// Byte sum over the checksum window of a data-object image.
pub fn checksum(image: &[u8]) -> u16 {
    image
        .iter()
        .skip(SEC_UVDM_CHECKSUM_OFFSET)
        .take(SEC_UVDM_CHECKSUM_COUNT)
        .fold(0u32, |acc, &b| acc.wrapping_add(b as u32)) as u16
}
