use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::{Mutex, MutexGuard},
};

use serde::{Deserialize, Serialize};

use crate::{
    domain::{ChatId, UserId},
    errors::Error,
    Result,
};

// ============== Access List ==============

/// Persisted allow-list. Serialized as
/// `{"owners": [..], "allowed_users": [..], "allowed_groups": [..]}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessList {
    pub owners: BTreeSet<i64>,
    #[serde(default)]
    pub allowed_users: BTreeSet<i64>,
    #[serde(default)]
    pub allowed_groups: BTreeSet<i64>,
}

impl AccessList {
    /// First-run default: the owner is also listed as an allowed user.
    pub fn seeded(owner: UserId) -> Self {
        Self {
            owners: BTreeSet::from([owner.0]),
            allowed_users: BTreeSet::from([owner.0]),
            allowed_groups: BTreeSet::new(),
        }
    }

    pub fn is_owner(&self, user: UserId) -> bool {
        self.owners.contains(&user.0)
    }

    pub fn permits(&self, user: UserId, chat: ChatId, policy: GroupPolicy) -> bool {
        if self.is_owner(user) {
            return true;
        }
        let user_listed = self.allowed_users.contains(&user.0);
        let chat_listed = self.allowed_groups.contains(&chat.0);
        match policy {
            GroupPolicy::Permissive => user_listed || chat_listed,
            GroupPolicy::Strict => user_listed && (chat.is_private_with(user) || chat_listed),
        }
    }

    /// Apply one edit in place and report what happened.
    pub fn apply(&mut self, edit: AccessEdit) -> Mutation {
        let (set, id, adding) = match edit {
            AccessEdit::AddUser(u) => (&mut self.allowed_users, u.0, true),
            AccessEdit::RemoveUser(u) => (&mut self.allowed_users, u.0, false),
            AccessEdit::AddGroup(c) => (&mut self.allowed_groups, c.0, true),
            AccessEdit::RemoveGroup(c) => (&mut self.allowed_groups, c.0, false),
        };

        let changed = if adding {
            set.insert(id)
        } else {
            set.remove(&id)
        };

        match (adding, changed) {
            (true, true) => Mutation::Added,
            (true, false) => Mutation::AlreadyPresent,
            (false, true) => Mutation::Removed,
            (false, false) => Mutation::NotFound,
        }
    }
}

/// Whether an allowed group grants usage to every member.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GroupPolicy {
    /// `user ∈ owners ∪ allowed_users` or `chat ∈ allowed_groups`.
    #[default]
    Permissive,
    /// Non-owners must be allowed users; inside a group the group must be allowed too.
    Strict,
}

impl FromStr for GroupPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "strict" => Ok(Self::Strict),
            other => Err(Error::Config(format!(
                "unknown group policy {other:?} (expected \"permissive\" or \"strict\")"
            ))),
        }
    }
}

/// Owner-issued change to the allow-list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessEdit {
    AddUser(UserId),
    RemoveUser(UserId),
    AddGroup(ChatId),
    RemoveGroup(ChatId),
}

impl AccessEdit {
    pub fn target(self) -> i64 {
        match self {
            Self::AddUser(u) | Self::RemoveUser(u) => u.0,
            Self::AddGroup(c) | Self::RemoveGroup(c) => c.0,
        }
    }

    pub fn is_group(self) -> bool {
        matches!(self, Self::AddGroup(_) | Self::RemoveGroup(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutation {
    Added,
    AlreadyPresent,
    Removed,
    NotFound,
}

impl Mutation {
    pub fn changed(self) -> bool {
        matches!(self, Self::Added | Self::Removed)
    }
}

// ============== Store Port ==============

/// Injected authorization store.
///
/// Implementors provide a snapshot and an atomic commit; the permission rules
/// and the owner gate on edits live in the provided methods.
pub trait AccessStore: Send + Sync {
    fn policy(&self) -> GroupPolicy;

    fn snapshot(&self) -> AccessList;

    /// Apply `edit` and persist the whole list. No owner check.
    fn commit(&self, edit: AccessEdit) -> Result<Mutation>;

    fn is_owner(&self, user: UserId) -> bool {
        self.snapshot().is_owner(user)
    }

    fn is_allowed(&self, user: UserId, chat: ChatId) -> bool {
        self.snapshot().permits(user, chat, self.policy())
    }

    fn edit(&self, requester: UserId, edit: AccessEdit) -> Result<Mutation> {
        if !self.is_owner(requester) {
            return Err(Error::PermissionDenied(format!(
                "user {requester} is not an owner"
            )));
        }
        self.commit(edit)
    }

    fn add_user(&self, requester: UserId, target: UserId) -> Result<Mutation> {
        self.edit(requester, AccessEdit::AddUser(target))
    }

    fn remove_user(&self, requester: UserId, target: UserId) -> Result<Mutation> {
        self.edit(requester, AccessEdit::RemoveUser(target))
    }

    fn add_group(&self, requester: UserId, target: ChatId) -> Result<Mutation> {
        self.edit(requester, AccessEdit::AddGroup(target))
    }

    fn remove_group(&self, requester: UserId, target: ChatId) -> Result<Mutation> {
        self.edit(requester, AccessEdit::RemoveGroup(target))
    }

    fn list(&self, requester: UserId) -> Result<AccessList> {
        let list = self.snapshot();
        if !list.is_owner(requester) {
            return Err(Error::PermissionDenied(format!(
                "user {requester} is not an owner"
            )));
        }
        Ok(list)
    }
}

fn lock(state: &Mutex<AccessList>) -> MutexGuard<'_, AccessList> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============== In-memory Store ==============

#[derive(Debug)]
pub struct MemoryAccessStore {
    policy: GroupPolicy,
    state: Mutex<AccessList>,
}

impl MemoryAccessStore {
    pub fn new(list: AccessList, policy: GroupPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(list),
        }
    }
}

impl AccessStore for MemoryAccessStore {
    fn policy(&self) -> GroupPolicy {
        self.policy
    }

    fn snapshot(&self) -> AccessList {
        lock(&self.state).clone()
    }

    fn commit(&self, edit: AccessEdit) -> Result<Mutation> {
        Ok(lock(&self.state).apply(edit))
    }
}

// ============== File-backed Store ==============

/// JSON file store. The process is the only writer: the list is loaded once,
/// served from memory and rewritten in full (temp file + rename) on each change.
#[derive(Debug)]
pub struct FileAccessStore {
    path: PathBuf,
    policy: GroupPolicy,
    state: Mutex<AccessList>,
}

impl FileAccessStore {
    /// Open `path`, creating it from `seed_owner` when absent.
    pub fn open(
        path: impl Into<PathBuf>,
        seed_owner: Option<UserId>,
        policy: GroupPolicy,
    ) -> Result<Self> {
        let path = path.into();

        let list = if path.exists() {
            let mut list: AccessList = serde_json::from_str(&fs::read_to_string(&path)?)?;
            if list.owners.is_empty() {
                let owner = seed_owner.ok_or_else(|| {
                    Error::Config(format!(
                        "{} has no owners and OWNER_ID is not set",
                        path.display()
                    ))
                })?;
                list.owners.insert(owner.0);
                write_atomic(&path, &list)?;
            }
            list
        } else {
            let owner = seed_owner.ok_or_else(|| {
                Error::Config(format!(
                    "{} does not exist and OWNER_ID is not set",
                    path.display()
                ))
            })?;
            let list = AccessList::seeded(owner);
            write_atomic(&path, &list)?;
            tracing::info!(path = %path.display(), owner = %owner, "created access file");
            list
        };

        Ok(Self {
            path,
            policy,
            state: Mutex::new(list),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AccessStore for FileAccessStore {
    fn policy(&self) -> GroupPolicy {
        self.policy
    }

    fn snapshot(&self) -> AccessList {
        lock(&self.state).clone()
    }

    /// Blocks on file I/O while holding the lock. The file is a few hundred
    /// bytes and edits are rare owner commands, so async callers call this inline.
    fn commit(&self, edit: AccessEdit) -> Result<Mutation> {
        let mut state = lock(&self.state);
        let mut next = state.clone();
        let outcome = next.apply(edit);
        if outcome.changed() {
            // Memory only moves forward once the file is written.
            write_atomic(&self.path, &next)?;
            *state = next;
        }
        Ok(outcome)
    }
}

fn write_atomic(path: &Path, list: &AccessList) -> Result<()> {
    let Some(name) = path.file_name() else {
        return Err(Error::InvalidPath {
            path: path.to_path_buf(),
            reason: "access file path has no file name".to_string(),
        });
    };

    let mut tmp_name = name.to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let json = serde_json::to_string_pretty(list)?;
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
