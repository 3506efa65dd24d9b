//! POSIX shell quoting for printing reproducible command lines.

use std::borrow::Cow;

fn is_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | ',' | '@' | '+' | '%')
}

/// Quote one token so a POSIX shell reads it back unchanged.
pub fn quote(token: &str) -> Cow<'_, str> {
    if !token.is_empty() && token.chars().all(is_safe) {
        return Cow::Borrowed(token);
    }
    Cow::Owned(format!("'{}'", token.replace('\'', r"'\''")))
}

/// Join tokens into a single copy-pasteable command line.
pub fn join<I, S>(tokens: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokens
        .into_iter()
        .map(|token| quote(token.as_ref()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_list_keeps_its_inner_quotes() {
        assert_eq!(quote("\"device=0,1\""), "'\"device=0,1\"'");
        assert_eq!(quote("/models/llama2-7b"), "/models/llama2-7b");
        assert_eq!(quote(""), "''");
        assert_eq!(quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn join_quotes_only_where_needed() {
        let line = join(["docker", "run", "--gpus", "\"device=0\"", "img:1.4"]);
        assert_eq!(line, "docker run --gpus '\"device=0\"' img:1.4");
    }
}
