use proptest::prelude::*;
use wire::{encode_ack_batch, encode_data_header, encode_meta, parse_frame, DataHeader, Frame, MetaHeader};

proptest! {
    #[test]
    fn meta_round_trips_for_arbitrary_fields(
        transfer_id: u64,
        file_size: u64,
        chunk_size: u16,
        total_chunks: u32,
        ext in "[a-z]{0,5}",
    ) {
        let header = MetaHeader {
            transfer_id,
            file_size,
            chunk_size,
            total_chunks,
            ext: MetaHeader::ext_from_str(&ext),
        };
        let bytes = encode_meta(&header);
        let parsed = parse_frame(&bytes).unwrap();
        prop_assert_eq!(parsed, Frame::Meta(header));
    }

    #[test]
    fn data_header_round_trips_for_arbitrary_fields(
        transfer_id: u64,
        chunk_id: u32,
        payload in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let header = DataHeader {
            transfer_id,
            chunk_id,
            payload_length: payload.len() as u16,
        };
        let mut bytes = encode_data_header(&header).to_vec();
        bytes.extend_from_slice(&payload);
        match parse_frame(&bytes).unwrap() {
            Frame::Data { header: parsed, payload: parsed_payload } => {
                prop_assert_eq!(parsed, header);
                prop_assert_eq!(parsed_payload.to_vec(), payload);
            }
            other => prop_assert!(false, "expected Data, got {:?}", other),
        }
    }

    #[test]
    fn ack_batch_round_trips_for_arbitrary_ids(
        transfer_id: u64,
        ids in proptest::collection::vec(any::<u32>(), 0..256),
    ) {
        let bytes = encode_ack_batch(transfer_id, &ids).unwrap();
        match parse_frame(&bytes).unwrap() {
            Frame::AckBatch(batch) => {
                prop_assert_eq!(batch.transfer_id, transfer_id);
                prop_assert_eq!(batch.ids, ids);
            }
            other => prop_assert!(false, "expected AckBatch, got {:?}", other),
        }
    }
}
