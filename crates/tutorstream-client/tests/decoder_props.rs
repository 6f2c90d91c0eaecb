// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chunking-independence properties of the frame decoder.

use proptest::prelude::*;
use tutorstream_client::{Frame, FrameDecoder};

fn arb_chunk_text() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 .,!?éü✓\\u4e00-\\u4e20-]{0,40}").unwrap()
}

fn arb_frame() -> impl Strategy<Value = Frame> {
    prop_oneof![
        arb_chunk_text().prop_map(|text| Frame {
            kind: "content".into(),
            data: serde_json::json!({ "chunk": text }),
        }),
        arb_chunk_text().prop_map(|text| Frame {
            kind: "content".into(),
            data: serde_json::json!({ "full_response": text }),
        }),
        "[A-Za-z0-9+/]{200,2000}".prop_map(|b64| Frame {
            kind: "content".into(),
            data: serde_json::json!({ "image_result": format!("data:image/png;base64,{b64}") }),
        }),
        Just(Frame {
            kind: "done".into(),
            data: serde_json::json!({ "session_id": "s-1" }),
        }),
    ]
}

fn encode(frames: &[Frame]) -> Vec<u8> {
    let mut out = String::new();
    for frame in frames {
        out.push_str("data: ");
        out.push_str(&serde_json::to_string(frame).unwrap());
        out.push('\n');
    }
    out.into_bytes()
}

/// Cuts `bytes` at the given (sorted, deduplicated) offsets.
fn split_at_offsets(bytes: &[u8], mut offsets: Vec<usize>) -> Vec<&[u8]> {
    offsets.retain(|o| *o < bytes.len());
    offsets.sort_unstable();
    offsets.dedup();

    let mut pieces = Vec::new();
    let mut start = 0;
    for offset in offsets {
        pieces.push(&bytes[start..offset]);
        start = offset;
    }
    pieces.push(&bytes[start..]);
    pieces
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn any_chunking_yields_the_same_frames(
        frames in prop::collection::vec(arb_frame(), 1..8),
        offsets in prop::collection::vec(0usize..20_000, 0..40),
    ) {
        let bytes = encode(&frames);

        let mut decoder = FrameDecoder::new();
        let mut decoded = Vec::new();
        for piece in split_at_offsets(&bytes, offsets) {
            decoded.extend(decoder.feed_bytes(piece));
        }
        decoded.extend(decoder.flush());

        prop_assert_eq!(decoded, frames);
    }

    #[test]
    fn noise_between_frames_is_invisible(
        frames in prop::collection::vec(arb_frame(), 1..5),
        noise in prop::collection::vec(
            prop_oneof![Just(": ping\n"), Just("\n"), Just("event: message\n"), Just("\r\n")],
            0..5,
        ),
    ) {
        let mut input = String::new();
        for (i, frame) in frames.iter().enumerate() {
            if let Some(n) = noise.get(i) {
                input.push_str(n);
            }
            input.push_str("data: ");
            input.push_str(&serde_json::to_string(frame).unwrap());
            input.push('\n');
        }

        let mut decoder = FrameDecoder::new();
        let mut decoded = decoder.feed(&input);
        decoded.extend(decoder.flush());
        prop_assert_eq!(decoded, frames);
    }
}
