//! The RDF boundary adapter.
//!
//! Raw request bodies come in with a declared media type; what leaves this
//! crate is a [`StatementSet`] of canonical N-Triples lines, each terminated
//! with ` .`. Nothing downstream knows (or cares) about RDF syntax.

use tailr_types::StatementSet;

/// Base IRI for resolving relative references in Turtle and RDF/XML input.
pub const BASE_IRI: &str = "urn:x-default:tailr";

// --- Media types ---

/// The input serializations we accept on push.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaType {
    /// `application/n-triples`, also the fallback for unknown types.
    NTriples,

    /// `application/rdf+xml`
    RdfXml,

    /// `text/turtle`
    Turtle,
}

impl Default for MediaType {
    fn default() -> Self {
        Self::NTriples
    }
}

impl MediaType {
    /// Resolves a `Content-Type` header value, ignoring parameters such as
    /// `charset`. Unknown values fall back to N-Triples.
    pub fn from_content_type(value: &str) -> Self {
        let essence = value.split(';').next().unwrap_or(value).trim();
        if essence.eq_ignore_ascii_case("application/rdf+xml") {
            Self::RdfXml
        } else if essence.eq_ignore_ascii_case("text/turtle") {
            Self::Turtle
        } else {
            Self::NTriples
        }
    }
}

// --- Parsing ---

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("invalid base IRI: {0}")]
    BaseIri(#[from] oxrdf::IriParseError),

    #[error("RDF parse error: {0}")]
    Turtle(#[from] oxttl::TurtleParseError),

    #[error("RDF/XML parse error: {0}")]
    RdfXml(#[from] oxrdfxml::RdfXmlParseError),
}

/// Parses one document into its canonical statement set.
///
/// Duplicate statements collapse (set semantics). The N-Triples path runs
/// without IRI validation so that opaque or relative references pass through
/// verbatim, which is what clients of the original wire format rely on;
/// Turtle and RDF/XML resolve relative references against [`BASE_IRI`].
pub fn parse(body: &[u8], media_type: MediaType) -> Result<StatementSet, ParseError> {
    let mut stmts = StatementSet::default();
    match media_type {
        MediaType::NTriples => {
            for triple in oxttl::NTriplesParser::new().unchecked().for_reader(body) {
                stmts.insert(format!("{} .", triple?));
            }
        }
        MediaType::Turtle => {
            let parser = oxttl::TurtleParser::new().with_base_iri(BASE_IRI)?;
            for triple in parser.for_reader(body) {
                stmts.insert(format!("{} .", triple?));
            }
        }
        MediaType::RdfXml => {
            let parser = oxrdfxml::RdfXmlParser::new().with_base_iri(BASE_IRI)?;
            for triple in parser.for_reader(body) {
                stmts.insert(format!("{} .", triple?));
            }
        }
    }
    Ok(stmts)
}
