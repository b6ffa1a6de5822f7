//! Enveloped XML signature verification for metadata documents.
//!
//! Only a signature that is a direct child of the document root and that
//! references the root (by empty URI or by the root's ID) is accepted, so the
//! verified content is always the whole document the engine goes on to read.
//! Trust comes from the configured certificate alone; certificates embedded in
//! `KeyInfo` are ignored.

mod c14n;

use std::path::Path;

use aws_lc_rs::digest;
use aws_lc_rs::signature::{self, UnparsedPublicKey, VerificationAlgorithm};
use base64::Engine;
use tracing::debug;

use crate::document::{DocumentTree, Element};
use crate::error::{MetadataError, MetadataResult};
use crate::namespaces::{DS, EC};

pub(crate) use c14n::{canonicalize, inclusive_prefixes, scope_of, NamespaceScope};

/// Algorithm URIs recognised in `SignedInfo`.
pub mod algorithms {
    /// Exclusive canonicalization without comments.
    pub const EXCLUSIVE_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
    /// Enveloped signature transform.
    pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
    /// RSA-SHA256.
    pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
    /// RSA-SHA384.
    pub const RSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384";
    /// RSA-SHA512.
    pub const RSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512";
    /// ECDSA-SHA256.
    pub const ECDSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256";
    /// ECDSA-SHA384.
    pub const ECDSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha384";
    /// ECDSA-SHA512.
    pub const ECDSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha512";
    /// SHA-256 digest.
    pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
    /// SHA-384 digest.
    pub const SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#sha384";
    /// SHA-512 digest.
    pub const SHA512: &str = "http://www.w3.org/2001/04/xmlenc#sha512";
}

/// Signature algorithms accepted on metadata.
///
/// SHA-1 based algorithms are deliberately absent and fail verification as
/// unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// RSA PKCS#1 v1.5 with SHA-256.
    RsaSha256,
    /// RSA PKCS#1 v1.5 with SHA-384.
    RsaSha384,
    /// RSA PKCS#1 v1.5 with SHA-512.
    RsaSha512,
    /// ECDSA P-256 with SHA-256.
    EcdsaSha256,
    /// ECDSA P-384 with SHA-384.
    EcdsaSha384,
    /// ECDSA P-521 with SHA-512.
    EcdsaSha512,
}

impl SignatureAlgorithm {
    /// Returns the URI for this signature algorithm.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::RsaSha256 => algorithms::RSA_SHA256,
            Self::RsaSha384 => algorithms::RSA_SHA384,
            Self::RsaSha512 => algorithms::RSA_SHA512,
            Self::EcdsaSha256 => algorithms::ECDSA_SHA256,
            Self::EcdsaSha384 => algorithms::ECDSA_SHA384,
            Self::EcdsaSha512 => algorithms::ECDSA_SHA512,
        }
    }

    /// Parses a signature algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithms::RSA_SHA256 => Some(Self::RsaSha256),
            algorithms::RSA_SHA384 => Some(Self::RsaSha384),
            algorithms::RSA_SHA512 => Some(Self::RsaSha512),
            algorithms::ECDSA_SHA256 => Some(Self::EcdsaSha256),
            algorithms::ECDSA_SHA384 => Some(Self::EcdsaSha384),
            algorithms::ECDSA_SHA512 => Some(Self::EcdsaSha512),
            _ => None,
        }
    }

    /// Returns true if this algorithm uses ECDSA.
    #[must_use]
    pub const fn is_ecdsa(&self) -> bool {
        matches!(
            self,
            Self::EcdsaSha256 | Self::EcdsaSha384 | Self::EcdsaSha512
        )
    }

    fn verification(self) -> &'static dyn VerificationAlgorithm {
        match self {
            Self::RsaSha256 => &signature::RSA_PKCS1_2048_8192_SHA256,
            Self::RsaSha384 => &signature::RSA_PKCS1_2048_8192_SHA384,
            Self::RsaSha512 => &signature::RSA_PKCS1_2048_8192_SHA512,
            // XML-DSig carries ECDSA signatures as raw r || s
            Self::EcdsaSha256 => &signature::ECDSA_P256_SHA256_FIXED,
            Self::EcdsaSha384 => &signature::ECDSA_P384_SHA384_FIXED,
            Self::EcdsaSha512 => &signature::ECDSA_P521_SHA512_FIXED,
        }
    }
}

fn digest_algorithm(uri: &str) -> Option<&'static digest::Algorithm> {
    match uri {
        algorithms::SHA256 => Some(&digest::SHA256),
        algorithms::SHA384 => Some(&digest::SHA384),
        algorithms::SHA512 => Some(&digest::SHA512),
        _ => None,
    }
}

/// The certificate metadata signatures are checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedCertificate {
    subject: String,
    public_key: Vec<u8>,
}

impl TrustedCertificate {
    /// Loads a certificate from DER bytes.
    ///
    /// ## Errors
    ///
    /// Returns [`MetadataError::Certificate`] if the bytes are not an X.509 certificate.
    pub fn from_der(der: &[u8]) -> MetadataResult<Self> {
        let (_, cert) = x509_parser::parse_x509_certificate(der)
            .map_err(|e| MetadataError::Certificate(format!("failed to parse certificate: {e}")))?;
        let public_key: &[u8] = &cert.public_key().subject_public_key.data;

        Ok(Self {
            subject: cert.subject().to_string(),
            public_key: public_key.to_vec(),
        })
    }

    /// Loads a PEM encoded certificate.
    ///
    /// ## Errors
    ///
    /// Returns [`MetadataError::Certificate`] if no certificate block is found
    /// or it does not parse.
    pub fn from_pem(pem: &str) -> MetadataResult<Self> {
        let der = pem_to_der(pem, "CERTIFICATE")
            .ok_or_else(|| MetadataError::Certificate("invalid certificate PEM".to_string()))?;
        Self::from_der(&der)
    }

    /// Loads a PEM encoded certificate from disk.
    ///
    /// ## Errors
    ///
    /// Returns [`MetadataError::Certificate`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> MetadataResult<Self> {
        let pem = std::fs::read_to_string(path).map_err(|e| {
            MetadataError::Certificate(format!("unable to read {}: {e}", path.display()))
        })?;
        Self::from_pem(&pem)
    }

    /// Returns the certificate subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    fn verify(
        &self,
        algorithm: SignatureAlgorithm,
        data: &[u8],
        signature_value: &[u8],
    ) -> MetadataResult<()> {
        UnparsedPublicKey::new(algorithm.verification(), &self.public_key)
            .verify(data, signature_value)
            .map_err(|_| MetadataError::signature("signature value does not verify"))
    }
}

/// Extracts DER data from a PEM string.
pub(crate) fn pem_to_der(pem: &str, label: &str) -> Option<Vec<u8>> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");

    let start = pem.find(&begin)? + begin.len();
    let end_pos = pem.find(&end)?;
    if end_pos < start {
        return None;
    }

    base64::engine::general_purpose::STANDARD
        .decode(strip_whitespace(&pem[start..end_pos]))
        .ok()
}

fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

fn decode_base64(value: &str, what: &str) -> MetadataResult<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(strip_whitespace(value))
        .map_err(|e| MetadataError::signature(format!("invalid {what} encoding: {e}")))
}

fn required<'a>(parent: &'a Element, local_name: &str) -> MetadataResult<&'a Element> {
    parent
        .child(DS, local_name)
        .ok_or_else(|| MetadataError::signature(format!("missing {local_name} element")))
}

fn algorithm_of(element: &Element) -> MetadataResult<&str> {
    element.attribute("Algorithm").ok_or_else(|| {
        MetadataError::signature(format!("{} has no Algorithm", element.local_name()))
    })
}

/// Prefix list carried by an exclusive canonicalization element, if any.
fn prefix_list(method: &Element) -> Vec<Option<String>> {
    method
        .child(EC, "InclusiveNamespaces")
        .and_then(|e| e.attribute("PrefixList"))
        .map(inclusive_prefixes)
        .unwrap_or_default()
}

/// Computes the digest the root's enveloped signature should carry.
pub(crate) fn root_digest(
    tree: &DocumentTree,
    signature_element: Option<&Element>,
    inclusive: &[Option<String>],
    algorithm: &'static digest::Algorithm,
) -> MetadataResult<Vec<u8>> {
    let canonical = canonicalize(
        tree.root(),
        &NamespaceScope::new(),
        inclusive,
        signature_element,
    )?;
    Ok(digest::digest(algorithm, canonical.as_bytes()).as_ref().to_vec())
}

/// Canonical bytes of `SignedInfo`, with namespaces inherited from the root and
/// the signature element.
pub(crate) fn canonical_signed_info(
    root: &Element,
    signature_element: &Element,
    signed_info: &Element,
    inclusive: &[Option<String>],
) -> MetadataResult<String> {
    let scope = scope_of(&[root, signature_element]);
    canonicalize(signed_info, &scope, inclusive, None)
}

/// Verifies the enveloped signature on the document root.
///
/// ## Errors
///
/// Returns [`MetadataError::SignatureInvalid`] when the signature is missing,
/// uses an unsupported construction, references anything but the root, or
/// fails digest or signature checks.
pub fn verify_document(tree: &DocumentTree, certificate: &TrustedCertificate) -> MetadataResult<()> {
    let root = tree.root();
    let signature_element = root
        .child(DS, "Signature")
        .ok_or_else(|| MetadataError::signature("document is not signed"))?;
    let signed_info = required(signature_element, "SignedInfo")?;

    let c14n_method = required(signed_info, "CanonicalizationMethod")?;
    if algorithm_of(c14n_method)? != algorithms::EXCLUSIVE_C14N {
        return Err(MetadataError::signature(format!(
            "unsupported canonicalization {}",
            algorithm_of(c14n_method)?
        )));
    }

    let method_uri = algorithm_of(required(signed_info, "SignatureMethod")?)?;
    let algorithm = SignatureAlgorithm::from_uri(method_uri).ok_or_else(|| {
        MetadataError::signature(format!("unsupported signature algorithm {method_uri}"))
    })?;

    let mut references = signed_info.children_named(DS, "Reference");
    let reference = references
        .next()
        .ok_or_else(|| MetadataError::signature("missing Reference element"))?;
    if references.next().is_some() {
        return Err(MetadataError::signature("more than one Reference"));
    }
    check_reference_target(root, reference)?;

    let mut enveloped = false;
    let mut inclusive = Vec::new();
    for transform in reference.find_all(&[(DS, "Transforms"), (DS, "Transform")]) {
        match algorithm_of(transform)? {
            algorithms::ENVELOPED_SIGNATURE => enveloped = true,
            algorithms::EXCLUSIVE_C14N => inclusive = prefix_list(transform),
            other => {
                return Err(MetadataError::signature(format!(
                    "unsupported transform {other}"
                )))
            }
        }
    }
    if !enveloped {
        return Err(MetadataError::signature("signature is not enveloped"));
    }

    let digest_uri = algorithm_of(required(reference, "DigestMethod")?)?;
    let digest_alg = digest_algorithm(digest_uri).ok_or_else(|| {
        MetadataError::signature(format!("unsupported digest algorithm {digest_uri}"))
    })?;
    let expected = decode_base64(&required(reference, "DigestValue")?.text(), "digest")?;
    let computed = root_digest(tree, Some(signature_element), &inclusive, digest_alg)?;
    if computed != expected {
        return Err(MetadataError::signature("digest value mismatch"));
    }

    let signature_value =
        decode_base64(&required(signature_element, "SignatureValue")?.text(), "signature")?;
    let canonical = canonical_signed_info(
        root,
        signature_element,
        signed_info,
        &prefix_list(c14n_method),
    )?;
    certificate.verify(algorithm, canonical.as_bytes(), &signature_value)?;

    debug!(
        algorithm = algorithm.uri(),
        signer = certificate.subject(),
        "metadata signature verified"
    );
    Ok(())
}

fn check_reference_target(root: &Element, reference: &Element) -> MetadataResult<()> {
    let uri = reference
        .attribute("URI")
        .ok_or_else(|| MetadataError::signature("Reference has no URI"))?;
    if uri.is_empty() {
        return Ok(());
    }
    let root_id = root.attribute("ID").or_else(|| root.attribute("Id"));
    match (uri.strip_prefix('#'), root_id) {
        (Some(target), Some(id)) if target == id => Ok(()),
        _ => Err(MetadataError::signature(format!(
            "Reference {uri} does not point at the document root"
        ))),
    }
}
