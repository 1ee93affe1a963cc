use std::fmt;
use std::fmt::Display;
use std::fs;
use std::str::FromStr;

use regex::Regex;

use crate::instructions::instructions::DecodedInstr;

#[derive(Debug)]
pub enum LoadError {
    IOError(String),
    ParseError(String),
}

impl Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::IOError(msg) => write!(f, "{}", msg),
            LoadError::ParseError(msg) => write!(f, "{}", msg),
        }
    }
}

/// Loads a text trace: one `op dest src0 src1` record per line, signed
/// decimal integers. Blank lines and `#` comments are skipped.
pub fn load_trace(path: &str) -> Result<Vec<DecodedInstr>, LoadError> {
    let input = fs::read_to_string(path)
        .map_err(|err| LoadError::IOError(format!("Error reading trace file {}: {}", path, err)))?;
    parse_trace(&input)
}

pub fn parse_trace(input: &str) -> Result<Vec<DecodedInstr>, LoadError> {
    let record_pattern = Regex::new(r"^(-?\d+)\s+(-?\d+)\s+(-?\d+)\s+(-?\d+)$").unwrap();

    let mut records = Vec::new();
    for (line_index, raw_line) in input.lines().enumerate() {
        let line = match raw_line.find('#') {
            Some(pos) => &raw_line[..pos],
            None => raw_line,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let captures = record_pattern.captures(line).ok_or_else(|| {
            LoadError::ParseError(format!(
                "line {}: expected `op dest src0 src1`, got `{}`",
                line_index + 1,
                line
            ))
        })?;

        records.push(DecodedInstr {
            op_code: parse_num(&captures[1], line_index)?,
            dest_reg: parse_num(&captures[2], line_index)?,
            src_reg: [
                parse_num(&captures[3], line_index)?,
                parse_num(&captures[4], line_index)?,
            ],
        });
    }

    Ok(records)
}

fn parse_num<T: FromStr>(text: &str, line_index: usize) -> Result<T, LoadError> {
    text.parse::<T>().map_err(|_| {
        LoadError::ParseError(format!(
            "line {}: value out of range: {}",
            line_index + 1,
            text
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records() {
        let records = parse_trace("0 1 -1 -1\n2 3 1 -1\n").unwrap();
        assert_eq!(
            records,
            vec![
                DecodedInstr {
                    op_code: 0,
                    dest_reg: 1,
                    src_reg: [-1, -1]
                },
                DecodedInstr {
                    op_code: 2,
                    dest_reg: 3,
                    src_reg: [1, -1]
                },
            ]
        );
    }

    #[test]
    fn test_skips_blanks_and_comments() {
        let input = "\n# header comment\n  -1 2 3 4  # trailing comment\n\n";
        let records = parse_trace(input).unwrap();
        assert_eq!(
            records,
            vec![DecodedInstr {
                op_code: -1,
                dest_reg: 2,
                src_reg: [3, 4]
            }]
        );
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let err = parse_trace("0 1 -1 -1\n0 1 -1\n").unwrap_err();
        match err {
            LoadError::ParseError(msg) => assert!(msg.contains("line 2"), "{}", msg),
            LoadError::IOError(msg) => panic!("unexpected io error: {}", msg),
        }
    }

    #[test]
    fn test_out_of_range_value() {
        let err = parse_trace("0 99999 0 0\n").unwrap_err();
        match err {
            LoadError::ParseError(msg) => assert!(msg.contains("99999"), "{}", msg),
            LoadError::IOError(msg) => panic!("unexpected io error: {}", msg),
        }
    }
}
