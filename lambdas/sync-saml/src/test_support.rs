/// A signed metadata document; `id`, `digest` and `signature` are the fields
/// an IdP regenerates on every fetch.
pub fn metadata(id: &str, digest: &str, signature: &str, sso_location: &str) -> String {
    format!(
        r##"<?xml version="1.0" encoding="utf-8"?>
<EntityDescriptor ID="{id}" entityID="https://idp.example" xmlns="urn:oasis:names:tc:SAML:2.0:metadata">
  <Signature xmlns="http://www.w3.org/2000/09/xmldsig#">
    <SignedInfo>
      <CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/>
      <Reference URI="#{id}">
        <DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>
        <DigestValue>{digest}</DigestValue>
      </Reference>
    </SignedInfo>
    <SignatureValue>{signature}</SignatureValue>
  </Signature>
  <IDPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
    <KeyDescriptor use="signing">
      <KeyInfo xmlns="http://www.w3.org/2000/09/xmldsig#">
        <X509Data><X509Certificate>MIIC8DCCAdigAwIBAgIQ</X509Certificate></X509Data>
      </KeyInfo>
    </KeyDescriptor>
    <SingleSignOnService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" Location="{sso_location}"/>
    <SingleSignOnService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Location="{sso_location}"/>
  </IDPSSODescriptor>
</EntityDescriptor>
"##
    )
}

pub fn default_metadata() -> String {
    metadata("_a1", "digest-a", "signature-a", "https://idp.example/sso")
}
