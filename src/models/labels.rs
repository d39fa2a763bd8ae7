use crate::utils::error::DashError;
use crate::Result;
use std::path::Path;

/// Where a matching category list can be fetched: the 1000 torchvision
/// ImageNet names in output order, one per line.
pub const CATEGORY_LIST_SOURCE: &str =
    "https://raw.githubusercontent.com/pytorch/hub/master/imagenet_classes.txt";

/// Human-readable class names indexed by model output position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryLabels {
    names: Vec<String>,
}

impl CategoryLabels {
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(DashError::ModelLoad("category list is empty".to_string()));
        }
        if let Some(pos) = names.iter().position(|n| n.trim().is_empty()) {
            return Err(DashError::ModelLoad(format!(
                "category {} has an empty name",
                pos
            )));
        }
        Ok(Self { names })
    }

    /// One name per line; trailing blank lines are ignored.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DashError::ModelLoad(format!(
                "failed to read category list {}: {} (save the 1000 ImageNet class names, \
                 one per line in model output order, from {})",
                path.display(),
                e,
                CATEGORY_LIST_SOURCE
            ))
        })?;

        let mut lines: Vec<&str> = content.lines().map(str::trim_end).collect();
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }

        let labels = Self::from_names(lines)?;
        tracing::info!(
            "Loaded {} category labels from {}",
            labels.len(),
            path.display()
        );
        Ok(labels)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }
}
