/// Expand `${NAME}` placeholders from the process environment.
///
/// Unset variables and unterminated placeholders are copied through verbatim.
pub fn substitute_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        match std::env::var(name) {
            Ok(value) if !name.is_empty() => out.push_str(&value),
            _ => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_set_variable() {
        let Some((name, value)) = std::env::vars().find(|(k, _)| !k.is_empty() && !k.contains('}'))
        else {
            return;
        };
        assert_eq!(
            substitute_env(&format!("port = ${{{name}}};")),
            format!("port = {value};")
        );
    }

    #[test]
    fn keeps_unset_variable() {
        assert_eq!(
            substitute_env("bind = \"${LOBBY_UNSET_XYZ}\""),
            "bind = \"${LOBBY_UNSET_XYZ}\""
        );
    }

    #[test]
    fn keeps_unterminated_placeholder() {
        assert_eq!(substitute_env("a ${OPEN"), "a ${OPEN");
    }

    #[test]
    fn empty_name_is_literal() {
        assert_eq!(substitute_env("x${}y"), "x${}y");
    }
}
