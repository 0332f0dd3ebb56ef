use std::io::{Cursor, Read, Write};

use flate2::{
    write::{DeflateEncoder, GzEncoder, ZlibEncoder},
    Compression,
};
use httpwire::{
    body::{BodyDecoder, BodyState, Framing},
    error::{Error, Violation},
    header::{read_headers, HeaderList},
};

const PAYLOAD: &[u8] = b"Hello world! Hello world! Hello world! \xe2\x98\x83 The end.";

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn raw_deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn chunk(data: &[u8], size: usize) -> Vec<u8> {
    let mut output = Vec::new();

    for piece in data.chunks(size) {
        output.extend_from_slice(format!("{:X}\r\n", piece.len()).as_bytes());
        output.extend_from_slice(piece);
        output.extend_from_slice(b"\r\n");
    }

    output.extend_from_slice(b"0\r\n\r\n");
    output
}

fn headers(fields: &[(&str, &str)]) -> HeaderList {
    let mut headers = HeaderList::new();

    for (name, value) in fields {
        headers.append(*name, *value).unwrap();
    }

    headers
}

fn decode_response(status: u16, fields: &[(&str, &str)], entity: &[u8]) -> Result<Vec<u8>, Error> {
    let framing = Framing::from_response(status, &headers(fields))?;
    let mut body = BodyDecoder::new().decode(&framing, Cursor::new(entity))?;
    let mut output = Vec::new();

    body.read_to_end(&mut output)?;

    Ok(output)
}

#[test_log::test]
fn test_chunked_message() {
    let mut source = Cursor::new(
        b"Transfer-Encoding: chunked\r\n\
        Content-Type: text/plain\r\n\
        \r\n\
        4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n"
            .to_vec(),
    );
    let headers = read_headers(&mut source).unwrap();
    let framing = Framing::from_response(200, &headers).unwrap();
    assert!(framing.is_chunked());

    let mut body = BodyDecoder::new().decode(&framing, &mut source).unwrap();
    let mut output = Vec::new();
    body.read_to_end(&mut output).unwrap();

    assert_eq!(output, b"Wikipedia");
    assert_eq!(body.read(&mut [0u8; 8]).unwrap(), 0);
}

#[test_log::test]
fn test_not_modified_is_empty() {
    let mut source = Cursor::new(b"0123456789".to_vec());
    let framing = Framing::from_response(304, &headers(&[("Content-Length", "10")])).unwrap();

    let mut body = BodyDecoder::new().decode(&framing, &mut source).unwrap();
    assert_eq!(body.state(), BodyState::Empty);

    let mut output = Vec::new();
    body.read_to_end(&mut output).unwrap();
    assert!(output.is_empty());

    drop(body);
    assert_eq!(source.position(), 0);
}

#[test_log::test]
fn test_informational_and_no_content_are_empty() {
    for status in [100, 101, 204] {
        let output = decode_response(status, &[("Content-Length", "3")], b"abc").unwrap();
        assert!(output.is_empty(), "{}", status);
    }
}

#[test_log::test]
fn test_content_length() {
    let output = decode_response(200, &[("Content-Length", "5")], b"HelloNEXT").unwrap();
    assert_eq!(output, b"Hello");

    let output = decode_response(200, &[], b"no length").unwrap();
    assert!(output.is_empty());
}

#[test_log::test]
fn test_entity_length() {
    let framing = Framing {
        entity_length: Some(4),
        ..Default::default()
    };
    let mut body = BodyDecoder::new()
        .decode(&framing, Cursor::new(b"abcdef"))
        .unwrap();
    let mut output = Vec::new();
    body.read_to_end(&mut output).unwrap();

    assert_eq!(output, b"abcd");
}

#[test_log::test]
fn test_content_length_truncated() {
    let error = decode_response(200, &[("Content-Length", "20")], b"short").unwrap_err();

    assert!(matches!(
        error,
        Error::ProtocolViolation(Violation::Truncated)
    ));
}

#[test_log::test]
fn test_gzip_chunked() {
    let entity = chunk(&gzip(PAYLOAD), 7);
    let output =
        decode_response(200, &[("Transfer-Encoding", "gzip, chunked")], &entity).unwrap();

    assert_eq!(output, PAYLOAD);
}

#[test_log::test]
fn test_transfer_codings_over_multiple_fields() {
    let entity = chunk(&gzip(PAYLOAD), 16);
    let output = decode_response(
        200,
        &[
            ("Transfer-Encoding", "gzip"),
            ("Transfer-Encoding", "chunked"),
        ],
        &entity,
    )
    .unwrap();

    assert_eq!(output, PAYLOAD);
}

#[test_log::test]
fn test_transfer_encoding_ignores_content_length() {
    let entity = chunk(PAYLOAD, 10);
    let output = decode_response(
        200,
        &[("Content-Length", "3"), ("Transfer-Encoding", "chunked")],
        &entity,
    )
    .unwrap();

    assert_eq!(output, PAYLOAD);
}

#[test_log::test]
fn test_content_encoding_gzip() {
    let entity = gzip(PAYLOAD);
    let length = entity.len().to_string();
    let output = decode_response(
        200,
        &[("Content-Length", length.as_str()), ("Content-Encoding", "x-gzip")],
        &entity,
    )
    .unwrap();

    assert_eq!(output, PAYLOAD);
}

#[test_log::test]
fn test_content_encoding_deflate() {
    for entity in [zlib(PAYLOAD), raw_deflate(PAYLOAD)] {
        let length = entity.len().to_string();
        let output = decode_response(
            200,
            &[("Content-Length", length.as_str()), ("Content-Encoding", "deflate")],
            &entity,
        )
        .unwrap();

        assert_eq!(output, PAYLOAD);
    }
}

#[test_log::test]
fn test_chunked_and_content_encoding() {
    let entity = chunk(&gzip(PAYLOAD), 5);
    let output = decode_response(
        200,
        &[
            ("Transfer-Encoding", "chunked"),
            ("Content-Encoding", "identity, gzip"),
        ],
        &entity,
    )
    .unwrap();

    assert_eq!(output, PAYLOAD);
}

#[test_log::test]
fn test_content_encoding_in_single_byte_chunks() {
    for (coding, entity) in [
        ("deflate", raw_deflate(PAYLOAD)),
        ("deflate", zlib(PAYLOAD)),
        ("gzip", gzip(PAYLOAD)),
    ] {
        let output = decode_response(
            200,
            &[("Transfer-Encoding", "chunked"), ("Content-Encoding", coding)],
            &chunk(&entity, 1),
        )
        .unwrap();

        assert_eq!(output, PAYLOAD, "{}", coding);
    }
}

#[test_log::test]
fn test_content_encoding_first_chunk_short() {
    let entity = raw_deflate(PAYLOAD);
    let mut chunked = chunk(&entity[..1], 1);
    chunked.truncate(chunked.len() - b"0\r\n\r\n".len());
    chunked.extend_from_slice(&chunk(&entity[1..], 1024));

    let output = decode_response(
        200,
        &[("Transfer-Encoding", "chunked"), ("Content-Encoding", "deflate")],
        &chunked,
    )
    .unwrap();

    assert_eq!(output, PAYLOAD);
}

#[test_log::test]
fn test_corrupt_content_encoding() {
    let error = decode_response(
        200,
        &[("Content-Length", "12"), ("Content-Encoding", "gzip")],
        b"not gzipped!",
    )
    .unwrap_err();

    assert!(matches!(error, Error::MalformedSyntax(_)));
}

#[test_log::test]
fn test_unsupported_content_coding() {
    let mut source = Cursor::new(b"0123456789".to_vec());
    let framing = Framing::from_response(
        200,
        &headers(&[("Content-Length", "10"), ("Content-Encoding", "br")]),
    )
    .unwrap();

    let error = BodyDecoder::new()
        .decode(&framing, &mut source)
        .unwrap_err();

    assert!(matches!(error, Error::UnsupportedCoding(name) if name == "br"));
    assert_eq!(source.position(), 0);
}

#[test_log::test]
fn test_unsupported_transfer_coding() {
    let error = decode_response(200, &[("Transfer-Encoding", "compress, chunked")], b"")
        .unwrap_err();

    assert!(matches!(error, Error::UnsupportedCoding(name) if name == "compress"));
}

#[test_log::test]
fn test_only_last_six_codings_honored() {
    let output = decode_response(
        200,
        &[
            ("Content-Length", "5"),
            (
                "Content-Encoding",
                "br, identity, identity, identity, identity, identity, identity",
            ),
        ],
        b"Hello",
    )
    .unwrap();

    assert_eq!(output, b"Hello");
}

#[test_log::test]
fn test_max_length() {
    let framing = Framing::from_response(200, &headers(&[("Content-Length", "10")])).unwrap();
    let mut decoder = BodyDecoder::new();
    decoder.set_max_length(5);

    let mut body = decoder
        .decode(&framing, Cursor::new(b"0123456789"))
        .unwrap();
    let mut buf = [0u8; 100];

    assert_eq!(body.read(&mut buf).unwrap(), 5);
    assert_eq!(&buf[..5], b"01234");

    let error = Error::from(body.read(&mut buf).unwrap_err());
    assert!(matches!(error, Error::ReadLimitExceeded { limit: 5 }));
    assert!(body.is_closed());
}

#[test_log::test]
fn test_max_length_source_ends_at_limit() {
    let framing = Framing::from_response(200, &headers(&[("Content-Length", "10")])).unwrap();
    let mut decoder = BodyDecoder::new();
    decoder.set_max_length(5);

    let mut body = decoder.decode(&framing, Cursor::new(b"01234")).unwrap();
    let mut output = Vec::new();
    let error = Error::from(body.read_to_end(&mut output).unwrap_err());

    assert!(matches!(error, Error::ReadLimitExceeded { limit: 5 }));
    assert_eq!(output, b"01234");
}

#[test_log::test]
fn test_max_length_decompressed() {
    let payload = vec![b'a'; 10000];
    let entity = chunk(&gzip(&payload), 100);
    let framing =
        Framing::from_response(200, &headers(&[("Transfer-Encoding", "gzip, chunked")])).unwrap();
    let mut decoder = BodyDecoder::new();
    decoder.set_max_length(1000);

    let mut body = decoder.decode(&framing, Cursor::new(entity)).unwrap();
    let mut output = Vec::new();
    let error = Error::from(body.read_to_end(&mut output).unwrap_err());

    assert!(matches!(error, Error::ReadLimitExceeded { limit: 1000 }));
    assert_eq!(output.len(), 1000);
}

#[test_log::test]
fn test_decode_with() {
    let mut source = Cursor::new(chunk(b"Hello world!", 4));
    let framing =
        Framing::from_request(&headers(&[("Transfer-Encoding", "chunked")])).unwrap();

    let text = BodyDecoder::new()
        .decode_with(&framing, &mut source, |body| {
            let mut text = String::new();
            body.read_to_string(&mut text)?;
            Ok(text)
        })
        .unwrap();

    assert_eq!(text, "Hello world!");
    assert_eq!(source.position(), source.get_ref().len() as u64);
}

#[test_log::test]
fn test_decode_with_error_releases_stream() {
    let mut source = Cursor::new(b"4\r\nWiki".to_vec());
    let framing =
        Framing::from_request(&headers(&[("Transfer-Encoding", "chunked")])).unwrap();

    let result = BodyDecoder::new().decode_with(&framing, &mut source, |body| {
        let mut output = Vec::new();
        body.read_to_end(&mut output)?;
        Ok(output)
    });

    assert!(matches!(
        result,
        Err(Error::ProtocolViolation(Violation::Truncated))
    ));
    assert_eq!(source.position(), 7);
}

#[test_log::test]
fn test_conflicting_content_length() {
    let error = Framing::from_response(
        200,
        &headers(&[("Content-Length", "5"), ("Content-Length", "6")]),
    )
    .unwrap_err();

    assert!(matches!(
        error,
        Error::ProtocolViolation(Violation::ConflictingContentLength)
    ));
}
