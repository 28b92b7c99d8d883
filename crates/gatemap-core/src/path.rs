//! Path parameter extraction from route templates such as `/orders/{id}`.

use crate::parameter::{dedupe, ParameterDescriptor, ParameterKind};
use crate::Error;

/// Derive the required `Path` descriptors implied by the placeholders of a
/// route template, in left-to-right order.
///
/// Only segments fully wrapped in braces are placeholders; anything else,
/// including half-braced text like `{id` or `v{n}`, is literal.
///
/// ```
/// use gatemap_core::path::extract_path_params;
///
/// # fn main() -> gatemap_core::Result<()> {
/// let names: Vec<_> = extract_path_params("/orders/{id}/items/{itemId}")?
///     .iter()
///     .map(|p| p.name().to_string())
///     .collect();
/// assert_eq!(names, ["id", "itemId"]);
/// # Ok(())
/// # }
/// ```
pub fn extract_path_params(template: &str) -> crate::Result<Vec<ParameterDescriptor>> {
    let mut params = Vec::new();

    for segment in template.split('/').filter(|s| !s.is_empty()) {
        let Some(name) = placeholder_name(segment) else {
            continue;
        };
        if name.contains(['{', '}']) {
            return Err(Error::malformed_template(
                template,
                segment,
                "has unbalanced braces",
            ));
        }
        if name.trim().is_empty() {
            return Err(Error::malformed_template(
                template,
                segment,
                "is an empty placeholder",
            ));
        }
        if name != name.trim() {
            return Err(Error::malformed_template(
                template,
                segment,
                "has whitespace around the placeholder name",
            ));
        }
        params.push(ParameterDescriptor::new(ParameterKind::Path, name, true)?);
    }

    Ok(params)
}

/// Append the template's path parameters to `explicit` and drop duplicates.
///
/// This is the descriptor list a proxy route compiles its mappings from.
pub fn merge_path_params(
    template: &str,
    explicit: &[ParameterDescriptor],
) -> crate::Result<Vec<ParameterDescriptor>> {
    let mut all = explicit.to_vec();
    all.extend(extract_path_params(template)?);
    Ok(dedupe(all))
}

fn placeholder_name(segment: &str) -> Option<&str> {
    segment.strip_prefix('{')?.strip_suffix('}')
}
