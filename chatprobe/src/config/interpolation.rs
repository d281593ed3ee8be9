// Copyright 2026 The Chatprobe Project
// SPDX-License-Identifier: Apache-2.0

use super::error::ConfigError;

/// Expand `${VAR_NAME}` references from the environment.
///
/// An unterminated or empty reference is kept literally. A reference to an
/// unset variable is an error, so tokens never go out as `${TOKEN}`.
pub fn resolve_variables(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || chars.peek() != Some(&'{') {
            result.push(ch);
            continue;
        }
        chars.next();

        let mut name = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == '}' {
                closed = true;
                break;
            }
            name.push(c);
        }
        if !closed || name.is_empty() {
            result.push_str("${");
            result.push_str(&name);
            if closed {
                result.push('}');
            }
            continue;
        }

        let value = std::env::var(&name).map_err(|_| ConfigError::UndefinedVariable { name })?;
        result.push_str(&value);
    }

    Ok(result)
}
