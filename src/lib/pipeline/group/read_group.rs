//! Read group to sample / insert-size resolution.

use rustc_hash::FxHashMap;

use crate::core::error::{GroupError, Result};
use crate::core::intern::NameInterner;
use crate::engine::record::{AlignmentRecord, ReadGroup};

/// Per-read-group information used while clustering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadGroupInfo {
    pub sample: String,
    /// Dense index into the report's sample columns.
    pub sample_index: usize,
    pub max_insert: i64,
}

/// Lookup table from `RG` tag to [`ReadGroupInfo`], built once from the
/// merged header.
#[derive(Debug, Clone)]
pub struct ReadGroupRegistry {
    by_id: FxHashMap<String, ReadGroupInfo>,
    untagged: Option<ReadGroupInfo>,
    samples: NameInterner,
}

/// Parse an `MI` header value, tolerating a SAM-style `Z:` type prefix.
fn parse_max_insert(read_group: &str, text: &str) -> Result<i64> {
    let text = text.strip_prefix("Z:").unwrap_or(text).trim();
    text.parse::<i64>().map_err(|_| {
        GroupError::ReadGroupConfig(format!(
            "Read group {} has an invalid MI: field ('{}')",
            read_group, text
        ))
    })
}

impl ReadGroupRegistry {
    /// Build the registry.
    ///
    /// Each read group takes its maximum insert from its `MI` field, falling
    /// back to `default_max_insert`. Sample indices are assigned in
    /// first-seen order over header read groups, then `default_sample`.
    pub fn build(
        read_groups: &[ReadGroup],
        default_max_insert: Option<i64>,
        default_sample: Option<&str>,
    ) -> Result<Self> {
        let mut samples = NameInterner::new();
        let mut by_id = FxHashMap::default();

        for rg in read_groups {
            let max_insert = match rg.field("MI") {
                Some(text) => parse_max_insert(&rg.id, text)?,
                None => default_max_insert.ok_or_else(|| {
                    GroupError::ReadGroupConfig(format!(
                        "Read group {} has no MI: field (--max-insert required)",
                        rg.id
                    ))
                })?,
            };
            let sample = rg.sample().unwrap_or(&rg.id).to_string();
            let sample_index = samples.intern(&sample).index();
            by_id.insert(
                rg.id.clone(),
                ReadGroupInfo {
                    sample,
                    sample_index,
                    max_insert,
                },
            );
        }

        let untagged = match default_sample.filter(|s| !s.is_empty()) {
            Some(sample) => {
                let max_insert = default_max_insert.ok_or_else(|| {
                    GroupError::ReadGroupConfig(
                        "No maximum insert size given for read pairs without a read group \
                         (--max-insert required)"
                            .to_string(),
                    )
                })?;
                Some(ReadGroupInfo {
                    sample: sample.to_string(),
                    sample_index: samples.intern(sample).index(),
                    max_insert,
                })
            }
            None if by_id.is_empty() => {
                return Err(GroupError::ReadGroupConfig(
                    "No read groups listed (--default-sample and --max-insert required)"
                        .to_string(),
                ))
            }
            None => None,
        };

        Ok(Self {
            by_id,
            untagged,
            samples,
        })
    }

    /// Resolve the read group of `record`.
    pub fn find(&self, record: &AlignmentRecord) -> Result<&ReadGroupInfo> {
        match record.read_group.as_deref() {
            Some(id) => self.by_id.get(id).ok_or_else(|| GroupError::UnknownReadGroup {
                read: record.name.clone(),
                read_group: id.to_string(),
            }),
            None => self.untagged.as_ref().ok_or_else(|| GroupError::MissingReadGroup {
                read: record.name.clone(),
            }),
        }
    }

    /// Sample names in column order.
    pub fn samples(&self) -> &[String] {
        self.samples.names()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}
