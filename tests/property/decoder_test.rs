// tests/property/decoder_test.rs

//! The reply decoder and the coercion helpers must never panic, whatever
//! bytes a target sends.

use bytes::BytesMut;
use proptest::prelude::*;
use spinel_exporter::core::protocol::{ReplyValue, RespFrame, RespFrameCodec};
use tokio_util::codec::{Decoder, Encoder};

fn exercise(value: &ReplyValue) {
    let _ = value.as_i64();
    let _ = value.as_f64();
    let _ = value.as_string();
    let _ = value.clone().into_result();
    let _ = value.clone().into_field_map();
    if let Ok(items) = value.as_sequence() {
        items.iter().for_each(exercise);
    }
}

fn decode_all(data: &[u8]) -> Vec<ReplyValue> {
    let mut codec = RespFrameCodec;
    let mut buf = BytesMut::from(data);
    let mut values = Vec::new();
    while let Ok(Some(frame)) = codec.decode(&mut buf) {
        values.push(ReplyValue::from(frame));
    }
    values
}

fn resp_like() -> impl Strategy<Value = Vec<u8>> {
    let token = prop_oneof![
        Just(b"*".to_vec()),
        Just(b"$".to_vec()),
        Just(b":".to_vec()),
        Just(b"+".to_vec()),
        Just(b"-".to_vec()),
        Just(b"\r\n".to_vec()),
        Just(b"-1".to_vec()),
        "[0-9]{1,3}".prop_map(String::into_bytes),
        "[a-z ]{0,8}".prop_map(String::into_bytes),
    ];
    proptest::collection::vec(token, 0..24).prop_map(|parts| parts.concat())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 512,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_decoder_never_panics_on_random_bytes(
        data in proptest::collection::vec(any::<u8>(), 0..512)
    ) {
        for value in decode_all(&data) {
            exercise(&value);
        }
    }

    #[test]
    fn test_decoder_never_panics_on_resp_like_input(data in resp_like()) {
        for value in decode_all(&data) {
            exercise(&value);
        }
    }

    #[test]
    fn test_truncated_frames_wait_for_more_data(
        items in proptest::collection::vec("[a-z0-9]{0,16}", 1..8),
        cut in any::<prop::sample::Index>()
    ) {
        let frame = RespFrame::command(&items[..]);
        let mut encoded = BytesMut::new();
        RespFrameCodec.encode(frame.clone(), &mut encoded).unwrap();

        let cut = cut.index(encoded.len());
        let mut partial = BytesMut::from(&encoded[..cut]);
        prop_assert_eq!(RespFrameCodec.decode(&mut partial).unwrap(), None);

        let mut full = encoded.clone();
        prop_assert_eq!(RespFrameCodec.decode(&mut full).unwrap(), Some(frame));
    }
}
