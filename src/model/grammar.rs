//! Attribute description grammar.
//!
//! ```text
//! description := term ("," term)*
//! term        := name [":" type [":" "hash"]]
//!              | name "{" description "}"     single nested object
//!              | name "[" description "]"     nested collection
//! ```
//!
//! A term without a type is a `string`. Nested blocks are cut out of the
//! description in one left-to-right pass before the leaf terms are split, so
//! commas inside a block never reach the leaf splitter.

use tracing::debug;

use crate::error::GrammarError;

const DEFAULT_SEMANTIC_TYPE: &str = "string";

/// A leaf attribute as written in the description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: String,
    pub semantic_type: String,
    /// Set by a trailing `:hash` marker, e.g. `email:string:hash`.
    pub is_hash: bool,
}

/// A nested block, not yet parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedSpec {
    pub name: String,
    pub is_collection: bool,
    pub body: String,
}

/// One level of a parsed description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAttributes {
    pub leaves: Vec<AttributeSpec>,
    pub nested: Vec<NestedSpec>,
}

/// Parses one level of an attribute description.
///
/// Nested bodies are returned verbatim; callers recurse into them.
pub fn parse(description: &str) -> Result<ParsedAttributes, GrammarError> {
    let (nested, residual) = extract_nested(description)?;
    let leaves = parse_leaves(&residual)?;
    debug!(
        leaves = leaves.len(),
        nested = nested.len(),
        "parsed attribute description"
    );
    Ok(ParsedAttributes { leaves, nested })
}

/// Cuts every top-level nested block out of `description`.
///
/// Returns the blocks in declaration order and what is left for leaf
/// splitting.
fn extract_nested(description: &str) -> Result<(Vec<NestedSpec>, String), GrammarError> {
    let mut nested = Vec::new();
    let mut residual = String::with_capacity(description.len());
    let mut open: Vec<(char, usize)> = Vec::new();
    // start of the text not yet copied into `residual`
    let mut copied_up_to = 0;
    // earliest position a nested name may start at
    let mut name_floor = 0;

    for (pos, ch) in description.char_indices() {
        match ch {
            '{' | '[' => open.push((ch, pos)),
            '}' | ']' => {
                let expected = if ch == '}' { '{' } else { '[' };
                let (bracket, start) = match open.pop() {
                    Some(opened) => opened,
                    None => {
                        return Err(GrammarError::Unbalanced {
                            bracket: ch,
                            fragment: fragment_around(description, pos),
                        })
                    }
                };
                if bracket != expected {
                    return Err(GrammarError::Unbalanced {
                        bracket,
                        fragment: description[start..=pos].to_string(),
                    });
                }
                if !open.is_empty() {
                    continue;
                }

                let name_start = description[name_floor..start]
                    .rfind(',')
                    .map_or(name_floor, |comma| name_floor + comma + 1);
                let name = description[name_start..start].trim().replace(',', "");
                if name.is_empty() {
                    return Err(GrammarError::UnnamedNested {
                        fragment: description[name_start..=pos].to_string(),
                    });
                }

                nested.push(NestedSpec {
                    name,
                    is_collection: bracket == '[',
                    body: description[start + 1..pos].to_string(),
                });
                residual.push_str(&description[copied_up_to..name_start]);
                copied_up_to = pos + 1;
                name_floor = pos + 1;
            }
            _ => {}
        }
    }

    if let Some((bracket, start)) = open.first() {
        return Err(GrammarError::Unbalanced {
            bracket: *bracket,
            fragment: description[*start..].to_string(),
        });
    }

    residual.push_str(&description[copied_up_to..]);
    Ok((nested, residual))
}

fn parse_leaves(residual: &str) -> Result<Vec<AttributeSpec>, GrammarError> {
    residual
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(parse_leaf)
        .collect()
}

fn parse_leaf(term: &str) -> Result<AttributeSpec, GrammarError> {
    let parts: Vec<&str> = term.split(':').map(str::trim).collect();
    let malformed = || GrammarError::MalformedTerm {
        term: term.to_string(),
    };

    let name = parts[0];
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(malformed());
    }

    let semantic_type = match parts.get(1) {
        Some(tag) if tag.is_empty() => return Err(malformed()),
        Some(tag) => (*tag).to_string(),
        None => DEFAULT_SEMANTIC_TYPE.to_string(),
    };

    let is_hash = match parts.get(2) {
        Some(marker) if marker.eq_ignore_ascii_case("hash") => true,
        Some(_) => return Err(malformed()),
        None => false,
    };

    if parts.len() > 3 {
        return Err(malformed());
    }

    Ok(AttributeSpec {
        name: name.to_string(),
        semantic_type,
        is_hash,
    })
}

fn fragment_around(description: &str, pos: usize) -> String {
    let start = description[..pos].rfind(',').map_or(0, |comma| comma + 1);
    let end = description[pos..]
        .find(',')
        .map_or(description.len(), |comma| pos + comma);
    description[start..end].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str, semantic_type: &str) -> AttributeSpec {
        AttributeSpec {
            name: name.to_string(),
            semantic_type: semantic_type.to_string(),
            is_hash: false,
        }
    }

    #[test]
    fn leaf_terms_default_to_string() {
        let parsed = parse("name, price:float64").unwrap();
        assert_eq!(
            parsed.leaves,
            vec![leaf("name", "string"), leaf("price", "float64")]
        );
        assert!(parsed.nested.is_empty());
    }

    #[test]
    fn hash_marker() {
        let parsed = parse("email:string:HASH,name").unwrap();
        assert!(parsed.leaves[0].is_hash);
        assert!(!parsed.leaves[1].is_hash);
    }

    #[test]
    fn nested_object_and_collection_siblings() {
        let parsed = parse("title,address{street,zip:int},tags[label,weight:float],done:bool").unwrap();
        assert_eq!(parsed.leaves, vec![leaf("title", "string"), leaf("done", "bool")]);
        assert_eq!(
            parsed.nested,
            vec![
                NestedSpec {
                    name: "address".to_string(),
                    is_collection: false,
                    body: "street,zip:int".to_string(),
                },
                NestedSpec {
                    name: "tags".to_string(),
                    is_collection: true,
                    body: "label,weight:float".to_string(),
                },
            ]
        );
    }

    #[test]
    fn deep_nesting_stays_in_the_outer_body() {
        let parsed = parse("a{b{c:string}}").unwrap();
        assert!(parsed.leaves.is_empty());
        assert_eq!(parsed.nested.len(), 1);
        assert_eq!(parsed.nested[0].name, "a");
        assert_eq!(parsed.nested[0].body, "b{c:string}");
    }

    #[test]
    fn nested_name_is_trimmed() {
        let parsed = parse("id , owner { name }").unwrap();
        assert_eq!(parsed.nested[0].name, "owner");
        assert_eq!(parsed.leaves, vec![leaf("id", "string")]);
    }

    #[test]
    fn unclosed_block_reports_fragment() {
        let err = parse("a{b").unwrap_err();
        assert_eq!(
            err,
            GrammarError::Unbalanced {
                bracket: '{',
                fragment: "{b".to_string(),
            }
        );
    }

    #[test]
    fn stray_close_is_rejected() {
        assert!(matches!(
            parse("a,b}").unwrap_err(),
            GrammarError::Unbalanced { bracket: '}', .. }
        ));
    }

    #[test]
    fn mismatched_kinds_are_rejected() {
        assert!(matches!(
            parse("a{b]").unwrap_err(),
            GrammarError::Unbalanced { bracket: '{', .. }
        ));
    }

    #[test]
    fn unnamed_block_is_rejected() {
        assert!(matches!(
            parse("a,{b}").unwrap_err(),
            GrammarError::UnnamedNested { .. }
        ));
    }

    #[test]
    fn malformed_leaf_terms() {
        assert!(parse("name:").is_err());
        assert!(parse(":string").is_err());
        assert!(parse("name:string:range").is_err());
        assert!(parse("first name").is_err());
    }

    #[test]
    fn empty_description() {
        assert_eq!(parse("").unwrap(), ParsedAttributes::default());
    }
}
