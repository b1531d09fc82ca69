//! Rendering of [`Predicate`] trees to SQLite `SELECT` statements.
//!
//! Every searchable kind has a fixed outer-join graph with the aliases
//! `a` (artist), `r` (release), `t` (track), `tf` (track file), `f` (file)
//! and `g` (tag). Results are grouped by the root id so join fan-out never
//! duplicates an entity, and ordered by id so "first match" is stable.

use super::{Field, Predicate, Value};
use crate::error::{Error, Result};
use crate::model::EntityKind;

/// A rendered statement and its positional bind values.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub binds: Vec<Value>,
}

/// The joins available when searching one entity kind.
struct JoinGraph {
    root: &'static str,
    from: &'static str,
    aliases: &'static [&'static str],
}

const TRACK_CHAIN: &[&str] = &["a", "r", "t", "tf", "f", "g"];

impl JoinGraph {
    fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Track => JoinGraph {
                root: "t",
                from: "tracks t \
                    LEFT JOIN artists a ON a.id = t.artist_id \
                    LEFT JOIN releases r ON r.id = t.release_id \
                    LEFT JOIN track_files tf ON tf.track_id = t.id \
                    LEFT JOIN files f ON f.id = tf.file_id \
                    LEFT JOIN track_tags tg ON tg.track_id = t.id \
                    LEFT JOIN tags g ON g.id = tg.tag_id",
                aliases: TRACK_CHAIN,
            },
            EntityKind::Release => JoinGraph {
                root: "r",
                from: "releases r \
                    LEFT JOIN artists a ON a.id = r.artist_id \
                    LEFT JOIN tracks t ON t.release_id = r.id \
                    LEFT JOIN track_files tf ON tf.track_id = t.id \
                    LEFT JOIN files f ON f.id = tf.file_id \
                    LEFT JOIN release_tags rg ON rg.release_id = r.id \
                    LEFT JOIN tags g ON g.id = rg.tag_id",
                aliases: TRACK_CHAIN,
            },
            EntityKind::Artist => JoinGraph {
                root: "a",
                from: "artists a \
                    LEFT JOIN tracks t ON t.artist_id = a.id \
                    LEFT JOIN releases r ON r.id = t.release_id \
                    LEFT JOIN track_files tf ON tf.track_id = t.id \
                    LEFT JOIN files f ON f.id = tf.file_id \
                    LEFT JOIN artist_tags ag ON ag.artist_id = a.id \
                    LEFT JOIN tags g ON g.id = ag.tag_id",
                aliases: TRACK_CHAIN,
            },
            EntityKind::TrackFile => JoinGraph {
                root: "tf",
                from: "track_files tf \
                    LEFT JOIN files f ON f.id = tf.file_id \
                    LEFT JOIN tracks t ON t.id = tf.track_id \
                    LEFT JOIN artists a ON a.id = t.artist_id \
                    LEFT JOIN releases r ON r.id = t.release_id \
                    LEFT JOIN track_tags tg ON tg.track_id = t.id \
                    LEFT JOIN tags g ON g.id = tg.tag_id",
                aliases: TRACK_CHAIN,
            },
            EntityKind::File => JoinGraph {
                root: "f",
                from: "files f \
                    LEFT JOIN track_files tf ON tf.file_id = f.id \
                    LEFT JOIN tracks t ON t.id = tf.track_id \
                    LEFT JOIN artists a ON a.id = t.artist_id \
                    LEFT JOIN releases r ON r.id = t.release_id \
                    LEFT JOIN track_tags tg ON tg.track_id = t.id \
                    LEFT JOIN tags g ON g.id = tg.tag_id",
                aliases: TRACK_CHAIN,
            },
            EntityKind::Attachment => JoinGraph {
                root: "x",
                from: "attachments x LEFT JOIN files f ON f.id = x.file_id",
                aliases: &["f"],
            },
            EntityKind::Tag => JoinGraph {
                root: "g",
                from: "tags g",
                aliases: &["g"],
            },
        }
    }

    fn column(&self, kind: EntityKind, field: Field) -> Result<&'static str> {
        let (alias, column) = column_of(field);
        if self.aliases.contains(&alias) {
            Ok(column)
        } else {
            Err(Error::query(format!(
                "{field:?} is not reachable when searching {kind:?}"
            )))
        }
    }
}

fn column_of(field: Field) -> (&'static str, &'static str) {
    match field {
        Field::ArtistId => ("a", "a.id"),
        Field::ArtistName => ("a", "a.name"),
        Field::ReleaseId => ("r", "r.id"),
        Field::ReleaseName => ("r", "r.name"),
        Field::ReleaseCompilation => ("r", "r.compilation"),
        Field::ReleaseDirPath => ("r", "r.dirpath"),
        Field::TrackId => ("t", "t.id"),
        Field::TrackTitle => ("t", "t.title"),
        Field::TrackYear => ("t", "NULLIF(CAST(substr(t.date, 1, 4) AS INTEGER), 0)"),
        Field::TrackMonth => ("t", "NULLIF(CAST(substr(t.date, 6, 2) AS INTEGER), 0)"),
        Field::TrackDay => ("t", "NULLIF(CAST(substr(t.date, 9, 2) AS INTEGER), 0)"),
        Field::FileId => ("f", "f.id"),
        Field::FilePath => ("f", "f.path"),
        Field::TagName => ("g", "g.name"),
    }
}

/// Escape `%`, `_` and the escape character itself for `LIKE ... ESCAPE '\'`.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Render a search of `kind` filtered by `filter`.
pub fn select(kind: EntityKind, filter: &Predicate) -> Result<SqlQuery> {
    let graph = JoinGraph::for_kind(kind);
    let (rows, threshold) = filter.split_threshold()?;

    let mut sql = format!("SELECT {}.* FROM {}", graph.root, graph.from);
    let mut binds = Vec::new();

    if !rows.is_all() {
        sql.push_str(" WHERE ");
        render(&rows, kind, &graph, &mut sql, &mut binds)?;
    }

    sql.push_str(&format!(" GROUP BY {}.id", graph.root));

    if let Some(n) = threshold {
        if !graph.aliases.contains(&"g") {
            return Err(Error::query(format!("{kind:?} cannot be tagged")));
        }
        sql.push_str(" HAVING COUNT(DISTINCT g.id) >= ?");
        binds.push(Value::Int(n as i64));
    }

    sql.push_str(&format!(" ORDER BY {}.id", graph.root));
    Ok(SqlQuery { sql, binds })
}

/// Render a primary-key lookup.
pub fn select_by_id(kind: EntityKind) -> String {
    format!("SELECT * FROM {} WHERE id = ?", kind.table())
}

fn render(
    predicate: &Predicate,
    kind: EntityKind,
    graph: &JoinGraph,
    sql: &mut String,
    binds: &mut Vec<Value>,
) -> Result<()> {
    match predicate {
        Predicate::And(parts) | Predicate::Or(parts) => {
            let (joiner, empty) = if matches!(predicate, Predicate::And(_)) {
                (" AND ", "1")
            } else {
                (" OR ", "0")
            };
            if parts.is_empty() {
                sql.push_str(empty);
                return Ok(());
            }
            sql.push('(');
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    sql.push_str(joiner);
                }
                render(part, kind, graph, sql, binds)?;
            }
            sql.push(')');
        }
        Predicate::Eq(field, Value::Null) => {
            sql.push_str(graph.column(kind, *field)?);
            sql.push_str(" IS NULL");
        }
        Predicate::Eq(field, value) => {
            sql.push_str(graph.column(kind, *field)?);
            sql.push_str(" = ?");
            binds.push(value.clone());
        }
        Predicate::Like(field, pattern) => {
            sql.push_str(graph.column(kind, *field)?);
            sql.push_str(" LIKE ? ESCAPE '\\'");
            binds.push(Value::Text(format!("%{}%", escape_like(pattern))));
        }
        Predicate::TagCountAtLeast(_) => {
            return Err(Error::query(
                "tag count threshold is only allowed as a top-level conjunct",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::compile;

    #[test]
    fn test_select_all_tracks() {
        let q = select(EntityKind::Track, &Predicate::all()).unwrap();
        assert!(q.sql.starts_with("SELECT t.* FROM tracks t"));
        assert!(!q.sql.contains("WHERE"));
        assert!(q.sql.ends_with("GROUP BY t.id ORDER BY t.id"));
        assert!(q.binds.is_empty());
    }

    #[test]
    fn test_null_safe_equality() {
        let p = Predicate::And(vec![
            Predicate::equals(Field::TrackTitle, "X"),
            Predicate::Eq(Field::ArtistId, Value::Null),
            Predicate::equals(Field::ReleaseId, 4_i64),
        ]);
        let q = select(EntityKind::Track, &p).unwrap();
        assert!(q.sql.contains("WHERE (t.title = ? AND a.id IS NULL AND r.id = ?)"));
        assert_eq!(q.binds, vec![Value::Text("X".into()), Value::Int(4)]);
    }

    #[test]
    fn test_like_is_escaped() {
        let q = select(EntityKind::Release, &Predicate::like(Field::ReleaseName, "100%_")).unwrap();
        assert!(q.sql.contains("r.name LIKE ? ESCAPE '\\'"));
        assert_eq!(q.binds, vec![Value::Text("%100\\%\\_%".into())]);
    }

    #[test]
    fn test_tag_threshold_becomes_having() {
        let q = select(EntityKind::Track, &compile(&["+rock", "+live"])).unwrap();
        assert!(q.sql.contains("WHERE (g.name = ? OR g.name = ?)"));
        assert!(q.sql.contains("GROUP BY t.id HAVING COUNT(DISTINCT g.id) >= ?"));
        assert_eq!(q.binds.last(), Some(&Value::Int(2)));
    }

    #[test]
    fn test_release_search_uses_release_tags() {
        let q = select(EntityKind::Release, &compile(&["+rock"])).unwrap();
        assert!(q.sql.contains("release_tags rg"));
        assert!(q.sql.starts_with("SELECT r.* FROM releases r"));
    }

    #[test]
    fn test_unreachable_field_is_rejected() {
        let err = select(EntityKind::Tag, &Predicate::equals(Field::ArtistName, "Bob"));
        assert!(matches!(err, Err(Error::Query(_))));

        let err = select(EntityKind::Attachment, &compile(&["+a", "+b"]));
        assert!(matches!(err, Err(Error::Query(_))));
    }

    #[test]
    fn test_empty_or_renders_false() {
        let p = Predicate::And(vec![
            Predicate::Or(vec![]),
            Predicate::equals(Field::TagName, "x"),
        ]);
        let q = select(EntityKind::Tag, &p).unwrap();
        assert!(q.sql.contains("WHERE (0 AND g.name = ?)"));
    }

    #[test]
    fn test_select_by_id() {
        assert_eq!(
            select_by_id(EntityKind::TrackFile),
            "SELECT * FROM track_files WHERE id = ?"
        );
    }
}
