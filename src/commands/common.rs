use anyhow::{anyhow, Result};
use rearrgroup_lib::engine::ReferenceSequence;
use std::path::{Path, PathBuf};

/// Replace each `%XY` in `path` with field `XY` of `reference`, so that one
/// command line can select per-assembly files (e.g. `repeats.%AS.bed`).
///
/// Expansion stops at a `%` with fewer than two characters after it.
pub fn expand_reference_fields(path: &Path, reference: &ReferenceSequence) -> Result<PathBuf> {
    let text = path.to_string_lossy();
    let mut expanded = String::with_capacity(text.len());
    let mut rest: &str = &text;

    while let Some(percent) = rest.find('%') {
        let tag = match rest.get(percent + 1..percent + 3) {
            Some(tag) => tag,
            None => break,
        };
        let value = reference.field(tag).ok_or_else(|| {
            anyhow!(
                "{}: reference {} has no {} field to substitute",
                text,
                reference.name,
                tag
            )
        })?;
        expanded.push_str(&rest[..percent]);
        expanded.push_str(value);
        rest = &rest[percent + 3..];
    }
    expanded.push_str(rest);

    Ok(PathBuf::from(expanded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_reference_fields() {
        let reference = ReferenceSequence::new("1", 249_250_621)
            .with_field("AS", "GRCh37")
            .with_field("SP", "human");
        let path = expand_reference_fields(Path::new("/data/%SP/%AS/repeats.bed.gz"), &reference).unwrap();
        assert_eq!(path, PathBuf::from("/data/human/GRCh37/repeats.bed.gz"));

        let untouched = expand_reference_fields(Path::new("plain.bed"), &reference).unwrap();
        assert_eq!(untouched, PathBuf::from("plain.bed"));

        let trailing = expand_reference_fields(Path::new("odd%A"), &reference).unwrap();
        assert_eq!(trailing, PathBuf::from("odd%A"));
    }

    #[test]
    fn missing_field_is_an_error() {
        let reference = ReferenceSequence::new("1", 1_000);
        let err = expand_reference_fields(Path::new("ignore.%UR.bed"), &reference).unwrap_err();
        assert!(err.to_string().contains("UR"));
    }
}
