//! End-to-end properties of the LZMA2 compressor.

use lzscope_core::error::LzScopeError;
use lzscope_core::traits::StreamCompressor;
use lzscope_lzma2::{
    CHUNK_SIZE, Compressor, Container, MatchFinderKind, Mode, ParameterSet, decoder, measure,
};

/// Pseudo-random bytes (no repeats to exploit).
fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 33) as u8
        })
        .collect()
}

/// Text interleaved with noise, so both matches and literals show up.
fn mixed_bytes(len: usize) -> Vec<u8> {
    let text = b"It was the best of times, it was the worst of times, \
                 it was the age of wisdom, it was the age of foolishness. ";
    let noise = random_bytes(len, 99);
    let mut data = Vec::with_capacity(len);
    let mut i = 0;
    while data.len() < len {
        let take = (17 + i % 61).min(len - data.len());
        if i % 3 == 0 {
            data.extend_from_slice(&noise[data.len()..data.len() + take]);
        } else {
            data.extend(text.iter().cycle().skip(i % text.len()).take(take));
        }
        i += 1;
    }
    data
}

fn roundtrip(params: ParameterSet, data: &[u8]) -> Vec<u8> {
    let mut compressor = Compressor::new(params).expect("valid parameters");
    let packed = compressor.compress_all(data).expect("compress");
    let unpacked = decoder::decompress(&packed, params.dict_size).expect("decompress");
    assert_eq!(unpacked, data, "round trip failed for {:?}", params);
    packed
}

fn size_bound(len: usize) -> usize {
    len + 3 * len.div_ceil(CHUNK_SIZE) + 1
}

#[test]
fn test_empty_input() {
    let mut compressor = Compressor::new(ParameterSet::default()).unwrap();
    let packed = compressor.flush().unwrap();
    assert_eq!(packed, [0x00]);
    assert!(decoder::decompress(&packed, 1 << 20).unwrap().is_empty());
}

#[test]
fn test_single_byte() {
    let packed = roundtrip(ParameterSet::default(), b"A");
    assert!(packed.len() <= size_bound(1));
}

#[test]
fn test_repeated_byte_ratio() {
    let data = vec![b'A'; 10_000];
    let packed = roundtrip(ParameterSet::default(), &data);
    assert!(
        packed.len() < data.len() / 10,
        "{} bytes for 10000 x 'A'",
        packed.len()
    );
}

#[test]
fn test_every_finder_and_mode() {
    let data = mixed_bytes(150_000);
    for kind in MatchFinderKind::ALL {
        for mode in [Mode::Fast, Mode::Normal] {
            let params = ParameterSet::default()
                .dict_size(1 << 16)
                .match_finder(kind)
                .mode(mode);
            let packed = roundtrip(params, &data);
            assert!(packed.len() < data.len(), "{} {} did not compress", kind, mode);
        }
    }
}

#[test]
fn test_every_preset() {
    let data = mixed_bytes(40_000);
    for level in 0..=9 {
        roundtrip(ParameterSet::preset(level).unwrap(), &data);
    }
}

#[test]
fn test_literal_and_position_bits() {
    let data = mixed_bytes(20_000);
    for (lc, lp, pb) in [(0, 0, 0), (4, 0, 4), (0, 4, 0), (2, 2, 1), (1, 3, 3)] {
        let params = ParameterSet::default().lc(lc).lp(lp).pb(pb);
        roundtrip(params, &data);
    }
}

#[test]
fn test_nice_len_and_depth_extremes() {
    let data = mixed_bytes(30_000);
    for kind in [MatchFinderKind::Hc4, MatchFinderKind::Bt4] {
        for (nice_len, depth) in [(1, 1), (2, 0), (273, 100), (8, 3)] {
            let params = ParameterSet::default()
                .match_finder(kind)
                .nice_len(nice_len)
                .depth(depth);
            roundtrip(params, &data);
        }
    }
}

#[test]
fn test_deterministic_output() {
    let data = mixed_bytes(100_000);
    let params = ParameterSet::preset(7).unwrap();
    let first = roundtrip(params, &data);
    let second = roundtrip(params, &data);
    assert_eq!(first, second);
}

#[test]
fn test_size_bound_incompressible() {
    for len in [1, 100, CHUNK_SIZE - 1, CHUNK_SIZE, CHUNK_SIZE + 1, 3 * CHUNK_SIZE + 77] {
        let data = random_bytes(len, len as u64);
        let packed = roundtrip(ParameterSet::default(), &data);
        assert!(
            packed.len() <= size_bound(len),
            "{} bytes for {} random bytes",
            packed.len(),
            len
        );
    }
}

#[test]
fn test_lc_lp_limit() {
    let err = Compressor::new(ParameterSet::default().lc(3).lp(2)).unwrap_err();
    assert!(matches!(err, LzScopeError::InvalidParameters { .. }));
    assert!(!err.is_fatal());
    assert!(Compressor::new(ParameterSet::default().lc(4).lp(0)).is_ok());
    assert!(Compressor::new(ParameterSet::default().lc(0).lp(4)).is_ok());
}

#[test]
fn test_out_of_range_parameters() {
    let cases = [
        ParameterSet::default().dict_size(4095),
        ParameterSet::default().pb(5),
        ParameterSet::default().nice_len(0),
        ParameterSet::default().nice_len(274),
        ParameterSet::default().depth(101),
    ];
    for params in cases {
        assert!(
            matches!(
                Compressor::new(params),
                Err(LzScopeError::InvalidParameters { .. })
            ),
            "{:?} accepted",
            params
        );
    }
    assert!(ParameterSet::preset(10).is_err());
}

#[test]
fn test_feed_granularity_independent() {
    let data = mixed_bytes(3 * CHUNK_SIZE + 1234);
    let params = ParameterSet::default().dict_size(1 << 17);
    let whole = measure(params, Container::Raw, &data, None).unwrap().output;
    for increment in [1, 1000, CHUNK_SIZE - 1, CHUNK_SIZE, CHUNK_SIZE + 1, 100_000] {
        let pieces = measure(params, Container::Raw, &data, Some(increment))
            .unwrap()
            .output;
        assert_eq!(pieces, whole, "increment {}", increment);
    }
    assert_eq!(decoder::decompress(&whole, params.dict_size).unwrap(), data);
}

#[test]
fn test_long_stream_slides_history() {
    // Several times the dictionary, with repeats both inside and beyond it.
    let block = mixed_bytes(20_000);
    let mut data = Vec::new();
    for i in 0..40 {
        data.extend_from_slice(&block[(i * 37) % 1000..]);
    }
    let params = ParameterSet::default().dict_size(1 << 16);
    let packed = roundtrip(params, &data);
    assert!(packed.len() < data.len() / 4);
}

#[test]
fn test_dictionary_reset_mid_stream() {
    let data = mixed_bytes(50_000);
    let params = ParameterSet::default();
    let mut compressor = Compressor::new(params).unwrap();
    let mut packed = compressor.compress(&data[..20_000]).unwrap();
    packed.extend(compressor.reset_dictionary().unwrap());
    packed.extend(compressor.compress(&data[20_000..]).unwrap());
    packed.extend(compressor.flush().unwrap());
    assert_eq!(decoder::decompress(&packed, params.dict_size).unwrap(), data);
}

#[test]
fn test_stream_misuse_after_flush() {
    let mut compressor = Compressor::new(ParameterSet::default()).unwrap();
    compressor.compress(b"some input").unwrap();
    let tail = compressor.flush().unwrap();
    assert_eq!(tail.last(), Some(&0x00));
    assert!(compressor.flush().unwrap().is_empty());

    let err = compressor.compress(b"late input").unwrap_err();
    assert!(matches!(err, LzScopeError::StreamMisuse { .. }));
    assert!(err.is_fatal());
    assert!(compressor.reset_dictionary().is_err());
}
