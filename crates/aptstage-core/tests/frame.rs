//! Wire format checks over a range of frames

use aptstage_core::protocol::{AptError, Frame, FrameHeader, MessageId, HEADER_SIZE};

#[test]
fn test_every_message_id_round_trips_header_only() {
    for id in MessageId::ALL {
        let frame = Frame::with_params(id.code(), 1, 2);
        let bytes = frame.encode().unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[0..2], &id.code().to_le_bytes());
        assert_eq!(Frame::decode(&bytes).unwrap(), frame);
    }
}

#[test]
fn test_data_lengths_round_trip() {
    for len in [0usize, 1, 6, 14, 84, 255, 256, 4096] {
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let frame = Frame::with_data(MessageId::MoveAbsolute.code(), data.clone());
        let bytes = frame.encode().unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + len);

        let header = FrameHeader::decode(&bytes).unwrap();
        assert!(header.has_data());
        assert_eq!(header.data_len(), len);
        assert_eq!(header.dest(), 0x50);

        let decoded = Frame::decode(&bytes).unwrap();
        assert_eq!(decoded.data(), Some(&data[..]));
    }
}

#[test]
fn test_decode_needs_full_data_block() {
    let bytes = Frame::with_data(MessageId::SetVelParams.code(), vec![0; 14])
        .encode()
        .unwrap();

    for cut in 0..bytes.len() {
        let err = Frame::decode(&bytes[..cut]).unwrap_err();
        assert!(matches!(err, AptError::TruncatedFrame { .. }), "cut at {cut}");
    }
}

#[test]
fn test_reply_pairs() {
    assert_eq!(MessageId::HwReqInfo.reply(), Some(MessageId::HwGetInfo));
    assert_eq!(MessageId::ReqStatusUpdate.reply(), Some(MessageId::GetStatusUpdate));
    assert_eq!(MessageId::MoveHome.reply(), Some(MessageId::MoveHomed));
    assert_eq!(MessageId::Identify.reply(), None);
}
