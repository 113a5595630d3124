//! Response body decoding: content codings, then charset.

use crate::http::Header;
use brotli::Decompressor;
use encoding_rs::Encoding;
use flate2::read::DeflateDecoder;
use flate2::read::GzDecoder;
use flate2::read::ZlibDecoder;
use sf_core::SyncError;
use sf_core::SyncResult;
use std::io::Read;

const CHARSET_SNIFF_LIMIT: usize = 8192;
const BROTLI_BUFFER_SIZE: usize = 4096;

pub(crate) fn decode_content_encoding(headers: &[Header], body: &[u8]) -> SyncResult<Vec<u8>> {
    // Codings are listed in the order they were applied; undo them last-first.
    let codings = content_codings(headers);
    codings.iter().rev().try_fold(body.to_vec(), |payload, coding| match coding.as_str() {
        "identity" => Ok(payload),
        "gzip" | "x-gzip" => drain(GzDecoder::new(payload.as_slice()), coding),
        "deflate" => drain(ZlibDecoder::new(payload.as_slice()), coding)
            .or_else(|_| drain(DeflateDecoder::new(payload.as_slice()), coding)),
        "br" => drain(Decompressor::new(payload.as_slice(), BROTLI_BUFFER_SIZE), coding),
        other => Err(SyncError::new(
            "net.http.content_encoding_unsupported",
            format!("fragment response uses unsupported coding `{other}`"),
        )),
    })
}

fn content_codings(headers: &[Header]) -> Vec<String> {
    headers
        .iter()
        .filter(|header| header.name.eq_ignore_ascii_case("content-encoding"))
        .flat_map(|header| header.value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

fn drain(mut reader: impl Read, coding: &str) -> SyncResult<Vec<u8>> {
    let mut payload = Vec::new();
    reader.read_to_end(&mut payload).map_err(|error| {
        SyncError::new(
            "net.http.decode_failed",
            format!("could not undo `{coding}` coding: {error}"),
        )
    })?;
    Ok(payload)
}

/// Decodes `body` using a `<meta charset>` hint, then the `Content-Type` charset, then UTF-8.
pub(crate) fn decode_text(body: &[u8], content_type: &str) -> String {
    let label = charset_from_html_prefix(body).or_else(|| charset_from_content_type(content_type));
    if let Some(encoding) = label.and_then(|label| Encoding::for_label(label.as_bytes())) {
        let (decoded, _, _) = encoding.decode(body);
        return decoded.into_owned();
    }

    String::from_utf8_lossy(body).into_owned()
}

fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|part| {
        let (name, value) = part.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let label = value.trim().trim_matches('"').trim_matches('\'');
        (!label.is_empty()).then(|| label.to_owned())
    })
}

fn charset_from_html_prefix(body: &[u8]) -> Option<String> {
    let prefix = String::from_utf8_lossy(&body[..body.len().min(CHARSET_SNIFF_LIMIT)]);
    let lower = prefix.to_ascii_lowercase();
    let mut search_start = 0_usize;

    while let Some(relative) = lower[search_start..].find("charset=") {
        let label_start = search_start + relative + "charset=".len();
        if let Some(label) = charset_label(&prefix[label_start..]) {
            return Some(label);
        }
        search_start = label_start;
    }

    None
}

fn charset_label(input: &str) -> Option<String> {
    let trimmed = input.trim_start();
    let first = trimmed.chars().next()?;

    let label = if first == '"' || first == '\'' {
        let rest = &trimmed[first.len_utf8()..];
        rest[..rest.find(first)?].trim()
    } else {
        let end = trimmed
            .find(|ch: char| ch.is_whitespace() || matches!(ch, '"' | '\'' | ';' | '>' | '/'))
            .unwrap_or(trimmed.len());
        trimmed[..end].trim()
    };

    (!label.is_empty()).then(|| label.to_owned())
}

#[cfg(test)]
mod tests {
    use super::decode_content_encoding;
    use super::decode_text;
    use crate::http::Header;
    use brotli::CompressorWriter;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    fn header(name: &str, value: &str) -> Header {
        match Header::new(name, value) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn decodes_gzip_content_encoding() {
        let mut encoded = Vec::new();
        {
            let mut encoder = GzEncoder::new(&mut encoded, Compression::default());
            assert!(encoder.write_all(b"<div id=\"ProductCount\">3</div>").is_ok());
            assert!(encoder.finish().is_ok());
        }

        let decoded = decode_content_encoding(&[header("Content-Encoding", "gzip")], &encoded);
        assert_eq!(decoded, Ok(b"<div id=\"ProductCount\">3</div>".to_vec()));
    }

    #[test]
    fn decodes_deflate_content_encoding() {
        let mut encoded = Vec::new();
        {
            let mut encoder = ZlibEncoder::new(&mut encoded, Compression::default());
            assert!(encoder.write_all(b"hello deflate").is_ok());
            assert!(encoder.finish().is_ok());
        }

        let decoded = decode_content_encoding(&[header("Content-Encoding", "deflate")], &encoded);
        assert_eq!(decoded, Ok(b"hello deflate".to_vec()));
    }

    #[test]
    fn decodes_brotli_content_encoding() {
        let mut encoded = Vec::new();
        {
            let mut writer = CompressorWriter::new(&mut encoded, 4096, 5, 22);
            assert!(writer.write_all(b"hello br").is_ok());
            assert!(writer.flush().is_ok());
        }

        let decoded = decode_content_encoding(&[header("Content-Encoding", "br")], &encoded);
        assert_eq!(decoded, Ok(b"hello br".to_vec()));
    }

    #[test]
    fn unknown_content_encoding_is_rejected() {
        let decoded = decode_content_encoding(&[header("Content-Encoding", "zstd")], b"x");
        assert!(decoded.is_err());
        if let Err(error) = decoded {
            assert_eq!(error.code, "net.http.content_encoding_unsupported");
        }
    }

    #[test]
    fn meta_charset_wins_over_content_type() {
        let body = b"<meta charset=\"windows-1252\"><p>Bl\xe5</p>";
        assert_eq!(
            decode_text(body, "text/html; charset=utf-8"),
            "<meta charset=\"windows-1252\"><p>Bl\u{e5}</p>"
        );
    }

    #[test]
    fn content_type_charset_and_utf8_fallback() {
        assert_eq!(decode_text(b"Gr\xf8nn", "text/html; charset=iso-8859-1"), "Gr\u{f8}nn");
        assert_eq!(decode_text("Grønn".as_bytes(), "text/html"), "Grønn");
    }
}
