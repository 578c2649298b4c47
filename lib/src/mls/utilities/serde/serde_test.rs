use bytes::{Bytes, BytesMut};
use hex_literal::hex;

use super::*;

#[test]
fn varint_uses_minimal_encoding() -> Result<()> {
    let cases: [(u32, &[u8]); 5] = [
        (0, &hex!("00")),
        (37, &hex!("25")),
        (15293, &hex!("7bbd")),
        (494_878_333, &hex!("9d7f3e7d")),
        ((1 << 30) - 1, &hex!("bfffffff")),
    ];

    for (value, encoded) in cases {
        let mut buf = BytesMut::new();
        serialize_varint(value, &mut buf)?;
        assert_eq!(&buf[..], encoded, "encoding of {value}");

        let mut reader = encoded;
        assert_eq!(deserialize_varint(&mut reader)?, value, "decoding of {value}");
    }

    Ok(())
}

#[test]
fn varint_rejects_bad_input() {
    let mut buf = BytesMut::new();
    assert!(
        matches!(serialize_varint(1 << 30, &mut buf), Err(Error::VarintExceeds30Bits)),
        "values above 30 bits can't be encoded"
    );

    let mut non_minimal: &[u8] = &hex!("4025");
    assert!(
        matches!(
            deserialize_varint(&mut non_minimal),
            Err(Error::MinimumEncodingWasNotUsed)
        ),
        "37 fits in a single byte"
    );

    let mut bad_prefix: &[u8] = &hex!("c0000000");
    assert!(
        matches!(
            deserialize_varint(&mut bad_prefix),
            Err(Error::InvalidVariableLengthIntegerPrefix)
        ),
        "prefix 0b11 is reserved"
    );

    let mut truncated: &[u8] = &hex!("9d7f");
    assert!(
        matches!(deserialize_varint(&mut truncated), Err(Error::BufferTooSmall)),
        "four byte varint cut short"
    );
}

#[test]
fn opaque_vec_checks_declared_length() -> Result<()> {
    let mut buf = BytesMut::new();
    serialize_opaque_vec(b"group", &mut buf)?;
    assert_eq!(&buf[..], b"\x05group");

    let mut short: &[u8] = b"\x06group";
    assert!(
        matches!(deserialize_opaque_vec(&mut short), Err(Error::BufferTooSmall)),
        "declared length exceeds the buffer"
    );

    Ok(())
}

#[test]
fn optional_flag_is_strict() {
    let mut two: &[u8] = &[2];
    assert!(
        matches!(deserialize_optional(&mut two), Err(Error::InvalidOptionalValue)),
        "only 0 and 1 are valid presence flags"
    );
}

#[test]
fn records_are_big_endian_length_prefixed() -> Result<()> {
    let mut writer = RecordWriter::new(7);
    writer.record(b"abc")?.record(b"")?;
    let bytes = writer.finish();

    assert_eq!(&bytes[..], &hex!("07 00000003 616263 00000000"));

    let mut reader = RecordReader::open(bytes, 7)?;
    assert_eq!(reader.version(), 7);
    assert_eq!(reader.record("first")?, Bytes::from_static(b"abc"));
    assert_eq!(reader.record("second")?, Bytes::new());
    assert!(!reader.has_unread_records(), "both records were consumed");
    assert!(
        matches!(reader.record("third"), Err(Error::MissingRecord("third"))),
        "reading past the end names the missing record"
    );

    Ok(())
}

#[test]
fn record_reader_tolerates_appended_records() -> Result<()> {
    let mut writer = RecordWriter::new(1);
    writer.record(b"known")?.record(b"added by a newer writer")?;

    let mut reader = RecordReader::open(writer.finish(), 1)?;
    assert_eq!(reader.record("known")?, Bytes::from_static(b"known"));
    assert!(reader.has_unread_records(), "newer record is left untouched");

    Ok(())
}

#[test]
fn record_reader_rejects_other_versions() {
    let bytes = RecordWriter::new(2).finish();
    assert!(
        matches!(
            RecordReader::open(bytes, 1),
            Err(Error::UnsupportedFormatVersion(2))
        ),
        "version 2 stream opened as version 1"
    );
}
