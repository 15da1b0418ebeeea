//! Headers file parsing for `chainspan-node ingest`.
//!
//! ```text
//! # hash                                                           prev
//! 5f0c...e1  0a9b...77
//! ```

use anyhow::{bail, Context, Result};
use chainspan::BlockHash;

/// One parsed line: the block's hash and its parent's hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub hash: BlockHash,
    pub prev_hash: BlockHash,
}

/// Parse every header in `contents`, in file order.
pub fn parse_headers(contents: &str) -> Result<Vec<Header>> {
    let mut headers = Vec::new();
    for (index, raw) in contents.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let [hash, prev] = fields.as_slice() else {
            bail!("line {line_no}: expected `<hash> <prev-hash>`, got {} fields", fields.len());
        };
        headers.push(Header {
            hash: hash
                .parse::<BlockHash>()
                .with_context(|| format!("line {line_no}: bad block hash"))?,
            prev_hash: prev
                .parse::<BlockHash>()
                .with_context(|| format!("line {line_no}: bad parent hash"))?,
        });
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(label: &str) -> String {
        BlockHash::digest(label.as_bytes()).to_hex()
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let contents = format!(
            "# test chain\n\n{} {}\n   \n{}\t{}\n",
            hex("a"),
            hex("root"),
            hex("b"),
            hex("a")
        );
        let headers = parse_headers(&contents).unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].prev_hash, BlockHash::digest(b"root"));
        assert_eq!(headers[1].hash, BlockHash::digest(b"b"));
    }

    #[test]
    fn rejects_wrong_field_count() {
        let err = parse_headers(&format!("{}\n", hex("a"))).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn rejects_bad_hex_with_line_number() {
        let contents = format!("{} {}\n{} zz\n", hex("a"), hex("root"), hex("b"));
        let err = parse_headers(&contents).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
