//! XML namespaces used by SAML metadata.

/// SAML 2.0 metadata.
pub const MD: &str = "urn:oasis:names:tc:SAML:2.0:metadata";
/// SAML 2.0 assertion.
pub const SAML: &str = "urn:oasis:names:tc:SAML:2.0:assertion";
/// Metadata UI extensions.
pub const MDUI: &str = "urn:oasis:names:tc:SAML:metadata:ui";
/// Metadata registration and publication info.
pub const MDRPI: &str = "urn:oasis:names:tc:SAML:metadata:rpi";
/// XML digital signatures.
pub const DS: &str = "http://www.w3.org/2000/09/xmldsig#";
/// Exclusive canonicalization (for `InclusiveNamespaces`).
pub const EC: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
/// The implicit `xml` prefix.
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
