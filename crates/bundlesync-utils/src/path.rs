use std::{env, iter::Peekable, path::PathBuf, str::Chars};

use nix::unistd::{getuid, User};

use crate::error::{PathError, PathResult};

/// Resolves a user-supplied path string into an absolute path.
///
/// `$VAR` and `${VAR}` are expanded from the environment, a leading `~` is
/// replaced with the home directory and relative paths are joined onto the
/// current directory.
///
/// # Errors
///
/// * [`PathError::Empty`] if the path is empty
/// * [`PathError::CurrentDir`] if the current directory cannot be determined
/// * [`PathError::MissingEnvVar`] if a referenced variable is undefined
/// * [`PathError::UnclosedVariable`] if a `${` is never closed
///
/// # Example
///
/// ```
/// use bundlesync_utils::path::resolve_path;
///
/// let resolved = resolve_path("/var/cache/bundlesync").unwrap();
/// assert!(resolved.is_absolute());
/// ```
pub fn resolve_path(path: &str) -> PathResult<PathBuf> {
    let path = path.trim();

    if path.is_empty() {
        return Err(PathError::Empty);
    }

    let resolved = expand_variables(path)?;
    let path_buf = PathBuf::from(resolved);

    if path_buf.is_absolute() {
        Ok(path_buf)
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path_buf))
            .map_err(|err| PathError::CurrentDir { source: err })
    }
}

/// Returns the user's home directory.
///
/// `$HOME` wins; otherwise the password database entry of the current user
/// is consulted, and `/` is the last resort.
pub fn home_dir() -> PathBuf {
    env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| {
        User::from_uid(getuid())
            .ok()
            .flatten()
            .map(|user| user.dir)
            .unwrap_or_else(|| PathBuf::from("/"))
    })
}

/// `$XDG_CONFIG_HOME`, defaulting to `$HOME/.config`.
pub fn xdg_config_home() -> PathBuf {
    env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// `$XDG_CACHE_HOME`, defaulting to `$HOME/.cache`.
pub fn xdg_cache_home() -> PathBuf {
    env::var("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".cache"))
}

fn expand_variables(path: &str) -> PathResult<String> {
    let mut result = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '$' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    let var_name = consume_until(&mut chars, '}')?;
                    expand_env_var(&var_name, &mut result, path)?;
                } else {
                    let var_name = consume_var_name(&mut chars);
                    if var_name.is_empty() {
                        result.push('$');
                    } else {
                        expand_env_var(&var_name, &mut result, path)?;
                    }
                }
            }
            '~' if result.is_empty() => result.push_str(&home_dir().to_string_lossy()),
            _ => result.push(c),
        }
    }

    Ok(result)
}

fn consume_until(chars: &mut Peekable<Chars>, delimiter: char) -> PathResult<String> {
    let mut var_name = String::new();

    for c in chars.by_ref() {
        if c == delimiter {
            return Ok(var_name);
        }
        var_name.push(c);
    }

    Err(PathError::UnclosedVariable {
        input: format!("${{{var_name}"),
    })
}

fn consume_var_name(chars: &mut Peekable<Chars>) -> String {
    let mut var_name = String::new();

    while let Some(c) = chars.next_if(|c| c.is_alphanumeric() || *c == '_') {
        var_name.push(c);
    }

    var_name
}

fn expand_env_var(var_name: &str, result: &mut String, original: &str) -> PathResult<()> {
    match var_name {
        "HOME" => result.push_str(&home_dir().to_string_lossy()),
        "XDG_CONFIG_HOME" => result.push_str(&xdg_config_home().to_string_lossy()),
        "XDG_CACHE_HOME" => result.push_str(&xdg_cache_home().to_string_lossy()),
        _ => {
            let value = env::var(var_name).map_err(|_| {
                PathError::MissingEnvVar {
                    input: original.into(),
                    var: var_name.into(),
                }
            })?;
            result.push_str(&value);
        }
    }
    Ok(())
}
