const DELIMITERS: [char; 3] = [' ', '-', '_'];

/// Builds a CloudFormation style logical id from a display name.
///
/// Words are separated by spaces, hyphens or underscores. Every word gets its
/// first character upper-cased while the rest keeps its case, so an
/// already normalized id comes back unchanged.
pub fn normalize(name: &str) -> String {
    let mut tokens = vec![name.to_string()];

    for delimiter in DELIMITERS {
        tokens = tokens
            .iter()
            .flat_map(|token| token.split(delimiter))
            .filter(|token| !token.is_empty())
            .map(String::from)
            .collect();
    }

    return tokens.iter().map(|token| capitalize(token)).collect();
}

fn capitalize(token: &str) -> String {
    let mut characters = token.chars();
    match characters.next() {
        Some(first) => first.to_uppercase().chain(characters).collect(),
        None => String::new(),
    }
}
