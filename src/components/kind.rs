//! Optional component identifiers.

use strum::IntoEnumIterator;

/// The optional pieces of software installed alongside the agent.
///
/// # Example
///
/// ```rust
/// use endpoint_agent_installer::ComponentKind;
///
/// for kind in ComponentKind::all() {
///     println!("{}", kind.display_name());
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[non_exhaustive]
pub enum ComponentKind {
    /// The `jq` JSON processor used by the agent's helper scripts.
    JsonTool,
    /// The ClamAV antivirus engine.
    AntivirusEngine,
    /// The agent's browser extension.
    BrowserExtension,
}

impl ComponentKind {
    /// Human-readable display name for the component.
    ///
    /// # Example
    ///
    /// ```rust
    /// use endpoint_agent_installer::ComponentKind;
    ///
    /// assert_eq!(ComponentKind::AntivirusEngine.display_name(), "ClamAV");
    /// ```
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::JsonTool => "jq",
            Self::AntivirusEngine => "ClamAV",
            Self::BrowserExtension => "Browser extension",
        }
    }

    /// Iterator over all known component kinds.
    pub fn all() -> impl Iterator<Item = Self> {
        <Self as IntoEnumIterator>::iter()
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}
