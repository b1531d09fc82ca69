//! Free-text filter terms to [`Predicate`].
//!
//! Each term is classified by the first rule that matches:
//!
//! | Form | Meaning |
//! |---|---|
//! | `field:value` | substring match on a known field |
//! | `field=value` | exact match on a known field |
//! | `+name` | entity carries the tag `name` |
//! | anything else | substring of artist name, release name or track title |
//!
//! Field aliases are case-insensitive: `album`/`release`, `artist`/`author`,
//! `title`/`track`, `path`, `year`, `month`, `day`. An unknown prefix such
//! as `foo:bar` is not an error; the whole term is searched as text.
//!
//! Terms of the same field category are OR'd, categories are AND'ed, every
//! unscoped term must match on its own, and several tags must all be
//! present on the same entity.

use super::{Field, Predicate, Value};

/// A field category addressable from a search term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Release,
    Artist,
    Title,
    Path,
    Year,
    Month,
    Day,
}

impl Category {
    /// Look up a category by alias (case-insensitive).
    pub fn from_alias(alias: &str) -> Option<Self> {
        match alias.to_ascii_lowercase().as_str() {
            "album" | "release" => Some(Category::Release),
            "artist" | "author" => Some(Category::Artist),
            "title" | "track" => Some(Category::Title),
            "path" => Some(Category::Path),
            "year" => Some(Category::Year),
            "month" => Some(Category::Month),
            "day" => Some(Category::Day),
            _ => None,
        }
    }

    fn predicate(self, value: &str, exact: bool) -> Predicate {
        let op = |field: Field| {
            if exact {
                Predicate::Eq(field, Value::Text(value.to_string()))
            } else {
                Predicate::Like(field, value.to_string())
            }
        };
        match self {
            Category::Release => op(Field::ReleaseName),
            Category::Artist => op(Field::ArtistName),
            Category::Title => op(Field::TrackTitle),
            Category::Path => Predicate::Or(vec![op(Field::ReleaseDirPath), op(Field::FilePath)]),
            Category::Year => date_part(Field::TrackYear, value, exact),
            Category::Month => date_part(Field::TrackMonth, value, exact),
            Category::Day => date_part(Field::TrackDay, value, exact),
        }
    }
}

/// Date components are integers; `month=3` and `month=03` are the same.
fn date_part(field: Field, value: &str, exact: bool) -> Predicate {
    if !exact {
        return Predicate::Like(field, value.to_string());
    }
    match value.trim().parse::<i64>() {
        Ok(n) => Predicate::Eq(field, Value::Int(n)),
        Err(_) => Predicate::Eq(field, Value::Text(value.to_string())),
    }
}

/// One classified search term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Scoped {
        category: Category,
        exact: bool,
        value: String,
    },
    Tag(String),
    Unscoped(String),
}

/// Classify a single term.
pub fn parse_term(raw: &str) -> Term {
    for (separator, exact) in [(':', false), ('=', true)] {
        if let Some((prefix, value)) = raw.split_once(separator)
            && let Some(category) = Category::from_alias(prefix)
        {
            return Term::Scoped {
                category,
                exact,
                value: value.to_string(),
            };
        }
    }

    if let Some(name) = raw.strip_prefix('+')
        && !name.is_empty()
    {
        return Term::Tag(name.to_string());
    }

    Term::Unscoped(raw.to_string())
}

/// Compile a list of terms into one predicate.
///
/// Blank terms are ignored; no terms at all yields [`Predicate::all`].
pub fn compile<S: AsRef<str>>(terms: &[S]) -> Predicate {
    let mut scoped: Vec<(Category, Vec<Predicate>)> = Vec::new();
    let mut unscoped = Vec::new();
    let mut tags: Vec<String> = Vec::new();

    for raw in terms {
        let raw = raw.as_ref().trim();
        if raw.is_empty() {
            continue;
        }
        match parse_term(raw) {
            Term::Scoped {
                category,
                exact,
                value,
            } => {
                let predicate = category.predicate(&value, exact);
                match scoped.iter_mut().find(|(c, _)| *c == category) {
                    Some((_, group)) => group.push(predicate),
                    None => scoped.push((category, vec![predicate])),
                }
            }
            Term::Tag(name) => {
                if !tags.contains(&name) {
                    tags.push(name);
                }
            }
            Term::Unscoped(text) => unscoped.push(Predicate::Or(vec![
                Predicate::Like(Field::ArtistName, text.clone()),
                Predicate::Like(Field::ReleaseName, text.clone()),
                Predicate::Like(Field::TrackTitle, text),
            ])),
        }
    }

    let mut conjuncts: Vec<Predicate> = scoped
        .into_iter()
        .map(|(_, group)| Predicate::or(group))
        .collect();
    conjuncts.extend(unscoped);

    if !tags.is_empty() {
        let wanted = tags.len();
        conjuncts.push(Predicate::or(
            tags.into_iter()
                .map(|name| Predicate::Eq(Field::TagName, Value::Text(name)))
                .collect(),
        ));
        if wanted > 1 {
            conjuncts.push(Predicate::TagCountAtLeast(wanted));
        }
    }

    Predicate::and(conjuncts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn unscoped(text: &str) -> Predicate {
        Predicate::Or(vec![
            Predicate::like(Field::ArtistName, text),
            Predicate::like(Field::ReleaseName, text),
            Predicate::like(Field::TrackTitle, text),
        ])
    }

    #[test]
    fn test_no_terms_matches_everything() {
        let terms: [&str; 0] = [];
        assert!(compile(&terms).is_all());
        assert!(compile(&["  ", ""]).is_all());
    }

    #[test]
    fn test_parse_term_rules() {
        assert_eq!(
            parse_term("album:Live"),
            Term::Scoped {
                category: Category::Release,
                exact: false,
                value: "Live".into()
            }
        );
        assert_eq!(
            parse_term("TITLE=Intro"),
            Term::Scoped {
                category: Category::Title,
                exact: true,
                value: "Intro".into()
            }
        );
        assert_eq!(parse_term("+rock"), Term::Tag("rock".into()));
        assert_eq!(parse_term("+"), Term::Unscoped("+".into()));
        assert_eq!(parse_term("foo:bar"), Term::Unscoped("foo:bar".into()));
    }

    #[test]
    fn test_first_separator_with_known_alias_wins() {
        // "artist=a:b" has the unknown prefix "artist=a" under the colon
        // rule, so the equals rule applies with value "a:b".
        assert_eq!(
            parse_term("artist=a:b"),
            Term::Scoped {
                category: Category::Artist,
                exact: true,
                value: "a:b".into()
            }
        );
        assert_eq!(
            parse_term("artist:a=b"),
            Term::Scoped {
                category: Category::Artist,
                exact: false,
                value: "a=b".into()
            }
        );
    }

    #[test]
    fn test_single_like_term() {
        assert_eq!(
            compile(&["artist:Bob"]),
            Predicate::like(Field::ArtistName, "Bob")
        );
    }

    #[test]
    fn test_exact_term() {
        assert_eq!(
            compile(&["release=Live"]),
            Predicate::equals(Field::ReleaseName, "Live")
        );
    }

    #[test]
    fn test_path_matches_directory_or_file() {
        assert_eq!(
            compile(&["path:/music"]),
            Predicate::Or(vec![
                Predicate::like(Field::ReleaseDirPath, "/music"),
                Predicate::like(Field::FilePath, "/music"),
            ])
        );
    }

    #[test]
    fn test_date_components() {
        assert_eq!(
            compile(&["year=1999"]),
            Predicate::equals(Field::TrackYear, 1999_i64)
        );
        assert_eq!(
            compile(&["month=03"]),
            Predicate::equals(Field::TrackMonth, 3_i64)
        );
        assert_eq!(
            compile(&["day:1"]),
            Predicate::like(Field::TrackDay, "1")
        );
        assert_eq!(
            compile(&["year=soon"]),
            Predicate::equals(Field::TrackYear, "soon")
        );
    }

    #[test]
    fn test_same_category_is_ored() {
        assert_eq!(
            compile(&["artist:Bob", "author:Alice"]),
            Predicate::Or(vec![
                Predicate::like(Field::ArtistName, "Bob"),
                Predicate::like(Field::ArtistName, "Alice"),
            ])
        );
    }

    #[test]
    fn test_different_categories_are_anded() {
        assert_eq!(
            compile(&["artist:Bob", "album:Live", "artist:Alice"]),
            Predicate::And(vec![
                Predicate::Or(vec![
                    Predicate::like(Field::ArtistName, "Bob"),
                    Predicate::like(Field::ArtistName, "Alice"),
                ]),
                Predicate::like(Field::ReleaseName, "Live"),
            ])
        );
    }

    #[test]
    fn test_unscoped_terms_are_anded() {
        assert_eq!(
            compile(&["bob", "live"]),
            Predicate::And(vec![unscoped("bob"), unscoped("live")])
        );
    }

    #[test]
    fn test_single_tag_has_no_threshold() {
        assert_eq!(compile(&["+rock"]), Predicate::equals(Field::TagName, "rock"));
    }

    #[test]
    fn test_multiple_tags_require_intersection() {
        assert_eq!(
            compile(&["+rock", "+live"]),
            Predicate::And(vec![
                Predicate::Or(vec![
                    Predicate::equals(Field::TagName, "rock"),
                    Predicate::equals(Field::TagName, "live"),
                ]),
                Predicate::TagCountAtLeast(2),
            ])
        );
    }

    #[test]
    fn test_repeated_tag_counts_once() {
        assert_eq!(compile(&["+rock", "+rock"]), compile(&["+rock"]));
    }

    #[test]
    fn test_mixed_terms_split_cleanly() {
        let p = compile(&["artist:Bob", "encore", "+rock", "+live"]);
        let (rows, threshold) = p.split_threshold().unwrap();
        assert_eq!(threshold, Some(2));
        match rows {
            Predicate::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("expected conjunction, got {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn prop_artist_author_aliases_agree(value in "[ -~]{0,24}") {
            let a = compile(&[format!("artist:{value}")]);
            let b = compile(&[format!("author:{value}")]);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_unknown_prefix_is_plain_text(prefix in "[b-h]{2,6}", value in "[a-z ]{0,12}") {
            prop_assume!(Category::from_alias(&prefix).is_none());
            let term = format!("{prefix}:{value}");
            let expected = term.trim().to_string();
            prop_assert_eq!(compile(&[term]), unscoped(&expected));
        }
    }
}
