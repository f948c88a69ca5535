//! Sensitive-span detection and redaction.
//!
//! Detection is regex-driven with two arithmetic gates: CPF and CNPJ
//! matches must carry valid verifier digits to count as high confidence,
//! and card numbers are Luhn-checked. Confidence for the remaining kinds
//! is the product of regex specificity and contextual proximity to a
//! kind-specific keyword list.

use lexgen_core::{
    sha256_hex, DetectionId, EntityIdType, PiiDetection, PiiKind, RedactionStrategy,
};
use once_cell::sync::Lazy;
use regex::Regex;

/// Detections below this confidence are excluded from strict redaction;
/// they stay in the report but the original text is left in place.
pub const REDACTION_CONFIDENCE_FLOOR: f32 = 0.5;

/// Window (in bytes, before the match) searched for kind keywords.
const KEYWORD_WINDOW: usize = 48;

// ============================================================================
// PATTERNS
// ============================================================================

static CPF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{3}\.?\d{3}\.?\d{3}-?\d{2}\b").unwrap());
static CNPJ_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{2}\.?\d{3}\.?\d{3}/?\d{4}-?\d{2}\b").unwrap());
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap());
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\+55\s?)?\(?\d{2}\)?\s?9?\d{4}[- ]?\d{4}\b").unwrap());
static RG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,2}\.\d{3}\.\d{3}-[0-9Xx]\b").unwrap());
static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:rua|avenida|av\.|alameda|travessa|rodovia|praça)\s+[^,\n;]{3,60},?\s*(?:n[ºo°.]?\s*)?\d+")
        .unwrap()
});
static CARD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d[ -]?){13,19}\b").unwrap());
static BANK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:ag[êe]ncia|conta(?:\s+corrente)?)\s*:?\s*\d{3,6}(?:-\d)?")
        .unwrap()
});

/// Keywords whose proximity raises confidence for the non-checksummed
/// kinds.
fn keywords(kind: PiiKind) -> &'static [&'static str] {
    match kind {
        PiiKind::TaxId => &["cpf", "contribuinte"],
        PiiKind::CorporateId => &["cnpj", "empresa", "razão social"],
        PiiKind::Email => &["email", "e-mail", "correio"],
        PiiKind::Phone => &["telefone", "tel", "celular", "fone", "contato"],
        PiiKind::NationalId => &["rg", "identidade", "registro geral"],
        PiiKind::Address => &["endereço", "domicílio", "residente", "sede"],
        PiiKind::CardNumber => &["cartão", "card", "crédito", "débito"],
        PiiKind::BankAccount => &["banco", "agência", "conta", "pix"],
    }
}

/// Base regex specificity per kind, before proximity weighting.
fn base_specificity(kind: PiiKind) -> f32 {
    match kind {
        // Checksummed kinds get their confidence from the arithmetic gate.
        PiiKind::TaxId | PiiKind::CorporateId => 0.0,
        PiiKind::Email => 0.95,
        PiiKind::Phone => 0.75,
        PiiKind::NationalId => 0.7,
        PiiKind::Address => 0.7,
        PiiKind::CardNumber => 0.5,
        PiiKind::BankAccount => 0.65,
    }
}

// ============================================================================
// VERIFIER-DIGIT ARITHMETIC
// ============================================================================

fn digits_of(s: &str) -> Vec<u32> {
    s.chars().filter_map(|c| c.to_digit(10)).collect()
}

/// CPF verifier digits: mod-11 over descending weights, twice.
pub fn cpf_is_valid(raw: &str) -> bool {
    let d = digits_of(raw);
    if d.len() != 11 {
        return false;
    }
    // All-same-digit sequences pass the arithmetic but are not issued.
    if d.iter().all(|&x| x == d[0]) {
        return false;
    }
    let check = |take: usize| -> u32 {
        let sum: u32 = d[..take]
            .iter()
            .enumerate()
            .map(|(i, &x)| x * (take as u32 + 1 - i as u32))
            .sum();
        (sum * 10) % 11 % 10
    };
    check(9) == d[9] && check(10) == d[10]
}

/// CNPJ verifier digits over the 5..2,9..2 weight ladder.
pub fn cnpj_is_valid(raw: &str) -> bool {
    let d = digits_of(raw);
    if d.len() != 14 {
        return false;
    }
    if d.iter().all(|&x| x == d[0]) {
        return false;
    }
    const W1: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
    const W2: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
    let check = |weights: &[u32]| -> u32 {
        let sum: u32 = d.iter().zip(weights.iter()).map(|(&x, &w)| x * w).sum();
        let rem = sum % 11;
        if rem < 2 {
            0
        } else {
            11 - rem
        }
    };
    check(&W1) == d[12] && check(&W2) == d[13]
}

/// Luhn checksum for payment card numbers.
pub fn luhn_is_valid(raw: &str) -> bool {
    let d = digits_of(raw);
    if d.len() < 13 || d.len() > 19 {
        return false;
    }
    let sum: u32 = d
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &x)| {
            if i % 2 == 1 {
                let doubled = x * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                x
            }
        })
        .sum();
    sum % 10 == 0
}

// ============================================================================
// DETECTION
// ============================================================================

fn keyword_factor(text: &str, start: usize, kind: PiiKind) -> f32 {
    let window_start = start.saturating_sub(KEYWORD_WINDOW);
    // Clamp to char boundaries so slicing cannot panic on UTF-8 text.
    let window_start = (0..=window_start)
        .rev()
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(0);
    let window = text[window_start..start].to_lowercase();
    if keywords(kind).iter().any(|k| window.contains(k)) {
        1.0
    } else {
        0.6
    }
}

struct RawMatch {
    kind: PiiKind,
    start: usize,
    end: usize,
    confidence: f32,
    verifier_valid: Option<bool>,
}

fn scan_kind(text: &str, kind: PiiKind, re: &Regex, out: &mut Vec<RawMatch>) {
    for m in re.find_iter(text) {
        let span = m.as_str();
        let (confidence, verifier_valid) = match kind {
            PiiKind::TaxId => {
                let valid = cpf_is_valid(span);
                (if valid { 0.95 } else { 0.3 }, Some(valid))
            }
            PiiKind::CorporateId => {
                let valid = cnpj_is_valid(span);
                (if valid { 0.95 } else { 0.3 }, Some(valid))
            }
            PiiKind::CardNumber => {
                let valid = luhn_is_valid(span);
                let base = if valid { 0.95 } else { base_specificity(kind) };
                (base * keyword_factor(text, m.start(), kind), Some(valid))
            }
            _ => (
                base_specificity(kind) * keyword_factor(text, m.start(), kind),
                None,
            ),
        };
        out.push(RawMatch {
            kind,
            start: m.start(),
            end: m.end(),
            confidence,
            verifier_valid,
        });
    }
}

/// Resolve overlapping matches: higher confidence wins, then the longer
/// span, then the earlier kind in enum order.
fn resolve_overlaps(mut matches: Vec<RawMatch>) -> Vec<RawMatch> {
    matches.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then((b.end - b.start).cmp(&(a.end - a.start)))
            .then(a.kind.cmp(&b.kind))
    });
    let mut kept: Vec<RawMatch> = Vec::new();
    for m in matches {
        let overlaps = kept.iter().any(|k| m.start < k.end && k.start < m.end);
        if !overlaps {
            kept.push(m);
        }
    }
    kept.sort_by_key(|m| m.start);
    kept
}

fn replacement_for(span: &str, kind: PiiKind, strategy: RedactionStrategy) -> String {
    match strategy {
        RedactionStrategy::Typed => format!("[{}_REDACTED]", kind.token()),
        RedactionStrategy::Hashed => {
            let digest = sha256_hex(span.as_bytes());
            format!("[{}_{}]", kind.token(), &digest[..8])
        }
        RedactionStrategy::Masked => span
            .chars()
            .map(|c| if c.is_alphanumeric() { '*' } else { c })
            .collect(),
    }
}

/// Scan a string for sensitive spans.
///
/// Returns the detection list with the replacement each span would get
/// under the given strategy. Detections below the confidence floor keep
/// the original text as their replacement.
pub fn detect_pii(text: &str, strategy: RedactionStrategy) -> Vec<PiiDetection> {
    let mut raw = Vec::new();
    scan_kind(text, PiiKind::CorporateId, &CNPJ_RE, &mut raw);
    scan_kind(text, PiiKind::TaxId, &CPF_RE, &mut raw);
    scan_kind(text, PiiKind::Email, &EMAIL_RE, &mut raw);
    scan_kind(text, PiiKind::NationalId, &RG_RE, &mut raw);
    scan_kind(text, PiiKind::CardNumber, &CARD_RE, &mut raw);
    scan_kind(text, PiiKind::Phone, &PHONE_RE, &mut raw);
    scan_kind(text, PiiKind::Address, &ADDRESS_RE, &mut raw);
    scan_kind(text, PiiKind::BankAccount, &BANK_RE, &mut raw);

    resolve_overlaps(raw)
        .into_iter()
        .map(|m| {
            let span = &text[m.start..m.end];
            let replacement = if m.confidence >= REDACTION_CONFIDENCE_FLOOR {
                replacement_for(span, m.kind, strategy)
            } else {
                span.to_string()
            };
            PiiDetection {
                detection_id: DetectionId::now_v7(),
                kind: m.kind,
                start: m.start,
                end: m.end,
                confidence: m.confidence,
                verifier_valid: m.verifier_valid,
                strategy,
                replacement,
            }
        })
        .collect()
}

/// Produce the redacted view of a string given its detections.
pub fn redact(text: &str, detections: &[PiiDetection]) -> String {
    let mut out = text.to_string();
    // Apply right-to-left so earlier offsets stay valid.
    let mut sorted: Vec<&PiiDetection> = detections.iter().collect();
    sorted.sort_by(|a, b| b.start.cmp(&a.start));
    for d in sorted {
        if d.end <= out.len() {
            out.replace_range(d.start..d.end, &d.replacement);
        }
    }
    out
}

/// Detect and redact in one pass.
pub fn redacted_view(text: &str, strategy: RedactionStrategy) -> (String, Vec<PiiDetection>) {
    let detections = detect_pii(text, strategy);
    let redacted = redact(text, &detections);
    (redacted, detections)
}

/// Convenience facade bundling detection and redaction under a fixed
/// strategy.
#[derive(Debug, Clone, Copy)]
pub struct PiiGate {
    strategy: RedactionStrategy,
}

impl PiiGate {
    pub fn new(strategy: RedactionStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> RedactionStrategy {
        self.strategy
    }

    /// Scan and redact a string, returning the redacted view and the
    /// detections observed.
    pub fn process(&self, text: &str) -> (String, Vec<PiiDetection>) {
        redacted_view(text, self.strategy)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpf_valid_check_digits() {
        assert!(cpf_is_valid("123.456.789-09"));
        assert!(cpf_is_valid("12345678909"));
        assert!(!cpf_is_valid("123.456.789-00"));
        assert!(!cpf_is_valid("111.111.111-11"));
    }

    #[test]
    fn test_cnpj_valid_check_digits() {
        // Well-known valid registry number.
        assert!(cnpj_is_valid("11.222.333/0001-81"));
        assert!(!cnpj_is_valid("11.222.333/0001-80"));
        assert!(!cnpj_is_valid("00.000.000/0000-00"));
    }

    #[test]
    fn test_luhn() {
        assert!(luhn_is_valid("4111 1111 1111 1111"));
        assert!(!luhn_is_valid("4111 1111 1111 1112"));
    }

    #[test]
    fn test_detect_valid_cpf_high_confidence() {
        let text = "O contratante, CPF 123.456.789-09, declara.";
        let detections = detect_pii(text, RedactionStrategy::Typed);
        let cpf: Vec<_> = detections
            .iter()
            .filter(|d| d.kind == PiiKind::TaxId)
            .collect();
        assert_eq!(cpf.len(), 1);
        assert!(cpf[0].confidence >= 0.9);
        assert_eq!(cpf[0].verifier_valid, Some(true));
        assert_eq!(cpf[0].replacement, "[CPF_REDACTED]");
    }

    #[test]
    fn test_detect_invalid_cpf_downgraded() {
        let text = "Número 123.456.789-00 informado.";
        let detections = detect_pii(text, RedactionStrategy::Typed);
        let cpf: Vec<_> = detections
            .iter()
            .filter(|d| d.kind == PiiKind::TaxId)
            .collect();
        assert_eq!(cpf.len(), 1);
        assert!(cpf[0].confidence < 0.5);
        assert_eq!(cpf[0].verifier_valid, Some(false));
        // Excluded from strict redaction: original text retained.
        assert_eq!(cpf[0].replacement, "123.456.789-00");
        let redacted = redact(text, &detections);
        assert!(redacted.contains("123.456.789-00"));
    }

    #[test]
    fn test_redacted_view_removes_digits() {
        let text = "Contratante CPF 123.456.789-09 e email joao@escritorio.adv.br.";
        let (redacted, detections) = redacted_view(text, RedactionStrategy::Typed);
        assert!(!redacted.contains("123.456.789-09"));
        assert!(!redacted.contains("joao@escritorio.adv.br"));
        assert!(redacted.contains("[CPF_REDACTED]"));
        assert!(redacted.contains("[EMAIL_REDACTED]"));
        assert_eq!(detections.len(), 2);
    }

    #[test]
    fn test_hashed_redaction_stable() {
        let text = "CPF 123.456.789-09 e novamente CPF 123.456.789-09.";
        let (redacted, detections) = redacted_view(text, RedactionStrategy::Hashed);
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].replacement, detections[1].replacement);
        assert!(redacted.matches(&detections[0].replacement).count() == 2);
        assert!(detections[0].replacement.starts_with("[CPF_"));
    }

    #[test]
    fn test_masked_redaction_preserves_length() {
        let text = "CPF 123.456.789-09";
        let (redacted, detections) = redacted_view(text, RedactionStrategy::Masked);
        assert_eq!(detections.len(), 1);
        assert_eq!(redacted.len(), text.len());
        assert!(redacted.contains("***.***.***-**"));
    }

    #[test]
    fn test_cnpj_not_double_reported_as_cpf() {
        let text = "CNPJ 11.222.333/0001-81 da contratada.";
        let detections = detect_pii(text, RedactionStrategy::Typed);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].kind, PiiKind::CorporateId);
    }

    #[test]
    fn test_email_keyword_proximity_raises_confidence() {
        let near = "Enviar para o e-mail: maria@adv.br";
        let far = "maria@adv.br";
        let d_near = detect_pii(near, RedactionStrategy::Typed);
        let d_far = detect_pii(far, RedactionStrategy::Typed);
        let c_near = d_near
            .iter()
            .find(|d| d.kind == PiiKind::Email)
            .unwrap()
            .confidence;
        let c_far = d_far
            .iter()
            .find(|d| d.kind == PiiKind::Email)
            .unwrap()
            .confidence;
        assert!(c_near > c_far);
    }

    #[test]
    fn test_card_number_luhn_gate() {
        let text = "Pagamento no cartão 4111 1111 1111 1111.";
        let detections = detect_pii(text, RedactionStrategy::Typed);
        let card = detections
            .iter()
            .find(|d| d.kind == PiiKind::CardNumber)
            .unwrap();
        assert_eq!(card.verifier_valid, Some(true));
        assert!(card.confidence >= 0.9);
    }

    #[test]
    fn test_address_detection() {
        let text = "Com sede na Avenida Paulista, nº 1000, São Paulo.";
        let detections = detect_pii(text, RedactionStrategy::Typed);
        assert!(detections.iter().any(|d| d.kind == PiiKind::Address));
    }

    #[test]
    fn test_no_detections_on_clean_text() {
        let text = "As obrigações contratuais seguem o disposto na cláusula quinta.";
        assert!(detect_pii(text, RedactionStrategy::Typed).is_empty());
    }

    #[test]
    fn test_utf8_text_does_not_panic() {
        let text = "Ação judicial nº 123 — autor João, CPF 123.456.789-09, domicílio não informado.";
        let (redacted, _) = redacted_view(text, RedactionStrategy::Typed);
        assert!(redacted.contains("[CPF_REDACTED]"));
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn prop_redaction_removes_valid_cpf(prefix in "[a-z ]{0,20}", suffix in "[a-z ]{0,20}") {
            let text = format!("{}CPF 123.456.789-09{}", prefix, suffix);
            let (redacted, _) = redacted_view(&text, RedactionStrategy::Typed);
            prop_assert!(!redacted.contains("123.456.789-09"));
        }

        #[test]
        fn prop_detect_offsets_in_bounds(text in ".{0,200}") {
            for d in detect_pii(&text, RedactionStrategy::Typed) {
                prop_assert!(d.start <= d.end);
                prop_assert!(d.end <= text.len());
            }
        }

        #[test]
        fn prop_detections_never_overlap(text in ".{0,200}") {
            let detections = detect_pii(&text, RedactionStrategy::Typed);
            for pair in detections.windows(2) {
                prop_assert!(pair[0].end <= pair[1].start);
            }
        }
    }
}
