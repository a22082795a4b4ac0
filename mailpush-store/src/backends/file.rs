use std::{
    path::{Path, PathBuf},
    sync::RwLock,
};

use async_trait::async_trait;
use mailpush_common::{
    internal,
    rule::{ContentKind, ForwardingRule},
};
use ron::ser::PrettyConfig;
use tokio::{io::AsyncWriteExt, sync::Mutex};

use crate::{Result, RuleField, RuleSet, StoreError, r#trait::MappingStore};

/// Rule store persisted as a RON list of rules.
///
/// Reads are served from memory. Each mutation is applied to a copy of the
/// rule set, written to `<file>.tmp`, synced and renamed over the existing file;
/// the in-memory set only changes once the new file is in place, so a failed
/// write leaves both untouched.
#[derive(Debug)]
pub struct FileMappingStore {
    path: PathBuf,
    rules: RwLock<RuleSet>,
    /// Serialises mutations so concurrent writers cannot lose updates
    writer: Mutex<()>,
}

impl FileMappingStore {
    ///
    /// Open the rule file at `path`, creating an empty one if it does not
    /// exist.
    ///
    /// # Errors
    /// If the file cannot be read or created, or does not contain valid rules
    ///
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let rules = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => RuleSet::default(),
            Ok(contents) => RuleSet::from_rules(ron::from_str::<Vec<ForwardingRule>>(&contents)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                internal!(
                    level = INFO,
                    "Rule file {} does not exist, creating it",
                    path.display()
                );
                let rules = RuleSet::default();
                write_atomically(&path, &rules).await?;
                rules
            }
            Err(err) => return Err(StoreError::io(path, err)),
        };

        internal!(
            level = INFO,
            "Loaded {} forwarding rules from {}",
            rules.len(),
            path.display()
        );

        Ok(Self {
            path,
            rules: RwLock::new(rules),
            writer: Mutex::new(()),
        })
    }

    async fn mutate<T, F>(&self, apply: F) -> Result<T>
    where
        F: FnOnce(&mut RuleSet) -> Result<T> + Send,
        T: Send,
    {
        let _writer = self.writer.lock().await;

        let mut next = self.rules.read()?.clone();
        let value = apply(&mut next)?;

        write_atomically(&self.path, &next).await?;
        *self.rules.write()? = next;

        Ok(value)
    }
}

async fn write_atomically(path: &Path, rules: &RuleSet) -> Result<()> {
    let serialized = ron::ser::to_string_pretty(rules, PrettyConfig::default())?;

    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    let tmp = path.with_file_name(name);

    let mut file = tokio::fs::File::create(&tmp)
        .await
        .map_err(|err| StoreError::io(&tmp, err))?;
    file.write_all(serialized.as_bytes())
        .await
        .map_err(|err| StoreError::io(&tmp, err))?;
    file.sync_all()
        .await
        .map_err(|err| StoreError::io(&tmp, err))?;
    drop(file);

    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|err| StoreError::io(path, err))
}

#[async_trait]
impl MappingStore for FileMappingStore {
    async fn lookup(&self, recipient: &str) -> Result<Vec<ForwardingRule>> {
        Ok(self.rules.read()?.lookup(recipient))
    }

    async fn list(&self) -> Result<Vec<ForwardingRule>> {
        Ok(self.rules.read()?.list())
    }

    async fn insert(&self, rule: ForwardingRule) -> Result<()> {
        self.mutate(|rules| {
            rules.insert(rule);
            Ok(())
        })
        .await
    }

    async fn update_field(
        &self,
        field: &str,
        value: &str,
        recipient: &str,
        content_kind: ContentKind,
    ) -> Result<usize> {
        let field = field.parse::<RuleField>()?;
        self.mutate(|rules| rules.update_field(field, value, recipient, content_kind))
            .await
    }

    async fn delete(
        &self,
        recipient: &str,
        destination_key: &str,
        content_kind: ContentKind,
    ) -> Result<bool> {
        self.mutate(|rules| Ok(rules.delete(recipient, destination_key, content_kind)))
            .await
    }
}
