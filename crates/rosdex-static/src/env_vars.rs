/// Declares all environment variables used throughout `rosdex` and its crates.
pub struct EnvVars;

impl EnvVars {
    /// Equivalent to the `--index-url` command-line argument. If set, rosdex will read the
    /// distribution index from this URL instead of the upstream index.
    ///
    /// Shares its name with the variable read by the `rosdistro` tooling, so an existing
    /// environment keeps working.
    pub const ROSDISTRO_INDEX_URL: &'static str = "ROSDISTRO_INDEX_URL";

    /// Equivalent to the `--workspace` command-line argument. If set, rosdex will keep its
    /// persistent Git databases in this directory.
    pub const ROSDEX_WORKSPACE_DIR: &'static str = "ROSDEX_WORKSPACE_DIR";

    /// Equivalent to the `--concurrency` command-line argument. Sets the maximum number of
    /// repositories fetched at the same time.
    pub const ROSDEX_CONCURRENT_FETCHES: &'static str = "ROSDEX_CONCURRENT_FETCHES";

    /// Equivalent to the `--ignore-local` command-line argument. If set, every repository is
    /// fetched into a fresh, temporary workspace.
    pub const ROSDEX_IGNORE_LOCAL: &'static str = "ROSDEX_IGNORE_LOCAL";

    /// Used for trace-level logging filters, as read by `tracing-subscriber`.
    pub const RUST_LOG: &'static str = "RUST_LOG";

    /// Disable interactive Git prompts in terminals, e.g., for credentials.
    pub const GIT_TERMINAL_PROMPT: &'static str = "GIT_TERMINAL_PROMPT";

    /// Path to the Git directory; unset before running Git so that the working directory wins.
    pub const GIT_DIR: &'static str = "GIT_DIR";

    /// Path to the Git working tree; unset before running Git.
    pub const GIT_WORK_TREE: &'static str = "GIT_WORK_TREE";

    /// Path to the Git index file; unset before running Git.
    pub const GIT_INDEX_FILE: &'static str = "GIT_INDEX_FILE";

    /// Path to the Git object directory; unset before running Git.
    pub const GIT_OBJECT_DIRECTORY: &'static str = "GIT_OBJECT_DIRECTORY";

    /// Alternate Git object directories; unset before running Git.
    pub const GIT_ALTERNATE_OBJECT_DIRECTORIES: &'static str = "GIT_ALTERNATE_OBJECT_DIRECTORIES";

    /// Author name used for commits created by Git.
    pub const GIT_AUTHOR_NAME: &'static str = "GIT_AUTHOR_NAME";

    /// Author email used for commits created by Git.
    pub const GIT_AUTHOR_EMAIL: &'static str = "GIT_AUTHOR_EMAIL";

    /// Committer name used for commits created by Git.
    pub const GIT_COMMITTER_NAME: &'static str = "GIT_COMMITTER_NAME";

    /// Committer email used for commits created by Git.
    pub const GIT_COMMITTER_EMAIL: &'static str = "GIT_COMMITTER_EMAIL";

    /// Ignore the system Git configuration (`/etc/gitconfig`).
    pub const GIT_CONFIG_NOSYSTEM: &'static str = "GIT_CONFIG_NOSYSTEM";

    /// Stop Git from discovering repositories above the given directories.
    pub const GIT_CEILING_DIRECTORIES: &'static str = "GIT_CEILING_DIRECTORIES";
}
