/// Splits a rule line into tokens.
///
/// Tokens are separated by whitespace, `,` or `;`. A token starting with a
/// double or single quote runs to the matching quote and may contain
/// separators. Inside an unquoted token, a `[` keeps the token open until
/// the closing `]`, so substring ranges such as `T[2,4]` stay whole.
pub(crate) fn tokenize(line: &str) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i < chars.len() && (chars[i] == ',' || chars[i] == ';') {
            i += 1;
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
        }
        if i >= chars.len() {
            break;
        }

        let quote = chars[i];
        if quote == '"' || quote == '\'' {
            i += 1;
            let start = i;
            while i < chars.len() && chars[i] != quote {
                i += 1;
            }
            tokens.push(chars[start..i].iter().collect());
            // skip the closing quote
            i = (i + 1).min(chars.len());
            continue;
        }

        let start = i;
        let mut in_brackets = false;
        while i < chars.len() {
            let c = chars[i];
            if c == '[' {
                in_brackets = true;
            } else if c == ']' {
                in_brackets = false;
            } else if !in_brackets && (c.is_whitespace() || c == ',' || c == ';') {
                break;
            }
            i += 1;
        }
        tokens.push(chars[start..i].iter().collect());
        if i < chars.len() && (chars[i] == ',' || chars[i] == ';') {
            i += 1;
        }
    }
    tokens
}
