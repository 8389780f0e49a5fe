use super::domain::DocumentKind;

const DEFAULT_MAX_PER_KIND: usize = 3;
const DEFAULT_MAX_BYTES: u64 = 5 * 1024 * 1024;

/// Per-deployment document limits: quota table per kind, accepted file
/// extensions, and maximum payload size. Injected into the submission
/// sub-machine so limits stay testable and overridable instead of living as
/// scattered literals.
#[derive(Debug, Clone)]
pub struct DocumentPolicy {
    max_personal: usize,
    max_proyecto: usize,
    max_subsanado: usize,
    max_exencion: usize,
    allowed_extensions: Vec<String>,
    max_bytes: u64,
}

impl DocumentPolicy {
    pub fn new(
        max_personal: usize,
        max_proyecto: usize,
        max_subsanado: usize,
        max_exencion: usize,
        allowed_extensions: Vec<String>,
        max_bytes: u64,
    ) -> Self {
        let allowed_extensions = allowed_extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .collect();

        Self {
            max_personal,
            max_proyecto,
            max_subsanado,
            max_exencion,
            allowed_extensions,
            max_bytes,
        }
    }

    /// Quota for a kind. Correction targets share the `subsanado` bucket.
    pub fn max_for(&self, kind: DocumentKind) -> usize {
        match kind {
            DocumentKind::Personal => self.max_personal,
            DocumentKind::Proyecto => self.max_proyecto,
            DocumentKind::Subsanado(_) => self.max_subsanado,
            DocumentKind::Exencion => self.max_exencion,
        }
    }

    pub fn allows_extension(&self, filename: &str) -> bool {
        let lower = filename.to_ascii_lowercase();
        self.allowed_extensions
            .iter()
            .any(|ext| lower.ends_with(&format!(".{ext}")))
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }
}

impl Default for DocumentPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_PER_KIND,
            DEFAULT_MAX_PER_KIND,
            DEFAULT_MAX_PER_KIND,
            DEFAULT_MAX_PER_KIND,
            vec!["pdf".to_string()],
            DEFAULT_MAX_BYTES,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::expedientes::domain::SubsanadoTarget;

    #[test]
    fn default_quota_is_three_per_kind() {
        let policy = DocumentPolicy::default();
        assert_eq!(policy.max_for(DocumentKind::Personal), 3);
        assert_eq!(policy.max_for(DocumentKind::Proyecto), 3);
        assert_eq!(
            policy.max_for(DocumentKind::Subsanado(SubsanadoTarget::Admin)),
            3
        );
        assert_eq!(policy.max_for(DocumentKind::Exencion), 3);
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let policy = DocumentPolicy::default();
        assert!(policy.allows_extension("acta.pdf"));
        assert!(policy.allows_extension("ACTA.PDF"));
        assert!(!policy.allows_extension("acta.docx"));
        assert!(!policy.allows_extension("pdf"));
    }

    #[test]
    fn extensions_are_normalized_on_construction() {
        let policy = DocumentPolicy::new(1, 1, 1, 1, vec![".PDF".to_string()], 1024);
        assert!(policy.allows_extension("nota.pdf"));
    }
}
