use std::any::type_name;

use documented::{Documented, DocumentedFields};
use toml_edit::{Decor, Item, RawString, Table};
use tracing::warn;

use crate::error::{ConfigError, Result};

/// Appends documentation lines as TOML comments to the given `Decor`.
///
/// Each line becomes a `#` comment; an existing prefix is kept and separated
/// from the new comments by an empty comment line.
pub fn append_docs_as_toml_comments(decor: &mut Decor, docs: &str) {
    let old_prefix = decor.prefix().and_then(RawString::as_str);
    let last_line = old_prefix.and_then(|prefix| prefix.lines().last());

    let comments: String = docs
        .lines()
        .map(|l| {
            if l.is_empty() {
                "#\n".into()
            } else {
                format!("# {l}\n")
            }
        })
        .collect();

    let new_prefix = match (old_prefix, last_line) {
        (Some(prefix), Some("")) => format!("{prefix}{comments}"),
        (Some(prefix), Some(_)) => format!("{prefix}#\n{comments}"),
        _ => comments,
    };
    decor.set_prefix(new_prefix);
}

/// Annotates a TOML `Table` with the field documentation of `T`.
///
/// Root tables do not receive the container-level doc comment.
pub fn annotate_toml_table<T>(table: &mut Table, is_root: bool) -> Result<()>
where
    T: Documented + DocumentedFields,
{
    if !is_root {
        append_docs_as_toml_comments(table.decor_mut(), T::DOCS);
    }

    for (mut key_mut, value_item) in table.iter_mut() {
        let key_str = key_mut.get();
        match T::get_field_docs(key_str) {
            Ok(docs) => {
                match value_item {
                    Item::None => {
                        return Err(ConfigError::UnexpectedTomlItem(key_str.into()));
                    }
                    Item::Value(_) => append_docs_as_toml_comments(key_mut.leaf_decor_mut(), docs),
                    Item::Table(sub_table) => {
                        append_docs_as_toml_comments(sub_table.decor_mut(), docs)
                    }
                    Item::ArrayOfTables(array) => {
                        if let Some(first_table) = array.iter_mut().next() {
                            append_docs_as_toml_comments(first_table.decor_mut(), docs);
                        }
                    }
                }
            }
            Err(_) => {
                warn!(
                    "Field '{}' found in TOML but not documented on '{}'",
                    key_str,
                    type_name::<T>()
                );
            }
        }
    }

    Ok(())
}
