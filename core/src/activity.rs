//! Activity and Fragment records reconstructed from an activity dump.

use serde::{Deserialize, Serialize};

/// Fragment lifecycle state, ordered from least to most active.
///
/// The numeric codes are the ones printed after `mState=` in a dump.
///
/// # Examples
///
/// ```
/// use dumpscope_core::LifecycleState;
///
/// assert_eq!(LifecycleState::from_code(7), LifecycleState::Resumed);
/// assert_eq!(LifecycleState::from_code(42), LifecycleState::Initializing);
/// assert!(LifecycleState::Started > LifecycleState::Created);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum LifecycleState {
    #[default]
    Initializing,
    Attached,
    Created,
    ViewCreated,
    AwaitingExitEffects,
    ActivityCreated,
    Started,
    AwaitingEnterEffects,
    Resumed,
}

impl LifecycleState {
    pub const ALL: [LifecycleState; 9] = [
        Self::Initializing,
        Self::Attached,
        Self::Created,
        Self::ViewCreated,
        Self::AwaitingExitEffects,
        Self::ActivityCreated,
        Self::Started,
        Self::AwaitingEnterEffects,
        Self::Resumed,
    ];

    /// Maps a dump code to a state. Unrecognized codes fall back to
    /// [`Initializing`](Self::Initializing).
    pub fn from_code(code: i32) -> Self {
        Self::ALL
            .into_iter()
            .find(|state| state.code() == code)
            .unwrap_or_default()
    }

    /// The numeric code, `-1` for `Initializing` through `7` for `Resumed`.
    pub fn code(self) -> i32 {
        match self {
            Self::Initializing => -1,
            Self::Attached => 0,
            Self::Created => 1,
            Self::ViewCreated => 2,
            Self::AwaitingExitEffects => 3,
            Self::ActivityCreated => 4,
            Self::Started => 5,
            Self::AwaitingEnterEffects => 6,
            Self::Resumed => 7,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Initializing => "INITIALIZING",
            Self::Attached => "ATTACHED",
            Self::Created => "CREATED",
            Self::ViewCreated => "VIEW_CREATED",
            Self::AwaitingExitEffects => "AWAITING_EXIT_EFFECTS",
            Self::ActivityCreated => "ACTIVITY_CREATED",
            Self::Started => "STARTED",
            Self::AwaitingEnterEffects => "AWAITING_ENTER_EFFECTS",
            Self::Resumed => "RESUMED",
        }
    }
}

/// A Fragment and its reconstructed children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentRecord {
    /// Concrete class name (text before the first `{`).
    pub class_name: String,
    /// Instance identity as printed, e.g. `HomeFragment{a1b2c3}`.
    pub instance: String,
    pub tag: Option<String>,
    pub state: LifecycleState,
    /// Owner token from `mWho=`.
    pub who: String,
    /// Class name of the declared parent fragment.
    pub parent: Option<String>,
    /// Instance identity of the declared parent fragment.
    pub parent_instance: Option<String>,
    pub hidden: bool,
    pub user_visible_hint: bool,
    /// Container view descriptor, up to and including its closing `}`.
    pub container: String,
    pub children: Vec<FragmentRecord>,
}

impl Default for FragmentRecord {
    fn default() -> Self {
        Self {
            class_name: String::new(),
            instance: String::new(),
            tag: None,
            state: LifecycleState::Initializing,
            who: String::new(),
            parent: None,
            parent_instance: None,
            hidden: false,
            user_visible_hint: true,
            container: String::new(),
            children: Vec::new(),
        }
    }
}

impl FragmentRecord {
    /// Number of fragments in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(FragmentRecord::subtree_len)
            .sum::<usize>()
    }

    /// Depth-first pre-order walk over this subtree.
    pub fn walk(&self) -> Vec<&FragmentRecord> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}

/// Display state of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityState {
    Resumed,
    Stopped,
    Finished,
    Other,
}

/// One `ACTIVITY` block of an activity dump.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub package: String,
    /// Activity component as printed; may be relative (`.MainActivity`).
    pub activity: String,
    pub pid: String,
    pub resumed: bool,
    pub stopped: bool,
    pub finished: bool,
    /// Top-level fragments; descendants hang off `children`.
    pub fragments: Vec<FragmentRecord>,
}

impl ActivityRecord {
    /// Fully qualified activity class name.
    ///
    /// # Examples
    ///
    /// ```
    /// use dumpscope_core::ActivityRecord;
    ///
    /// let record = ActivityRecord {
    ///     package: "com.example".into(),
    ///     activity: ".MainActivity".into(),
    ///     ..ActivityRecord::default()
    /// };
    /// assert_eq!(record.qualified_activity(), "com.example.MainActivity");
    /// ```
    pub fn qualified_activity(&self) -> String {
        if self.activity.starts_with('.') {
            format!("{}{}", self.package, self.activity)
        } else {
            self.activity.clone()
        }
    }

    /// Flags are independent in the dump; for display, resumed wins over
    /// stopped, which wins over finished.
    pub fn display_state(&self) -> ActivityState {
        if self.resumed {
            ActivityState::Resumed
        } else if self.stopped {
            ActivityState::Stopped
        } else if self.finished {
            ActivityState::Finished
        } else {
            ActivityState::Other
        }
    }

    /// Total fragments reachable from this activity.
    pub fn fragment_count(&self) -> usize {
        self.fragments.iter().map(FragmentRecord::subtree_len).sum()
    }
}
