use crate::error::SearchError;
use crate::models::ContentFormat;
use crate::units::UnitScheme;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum BackendId {
    Yargitay,
    Danistay,
    Emsal,
    Bedesten,
    AnayasaNorm,
    #[serde(rename = "anayasa-bb", alias = "anayasa-bireysel")]
    AnayasaBireysel,
    Rekabet,
    Kvkk,
    Bddk,
}

impl BackendId {
    pub const ALL: [BackendId; 9] = [
        BackendId::Yargitay,
        BackendId::Danistay,
        BackendId::Emsal,
        BackendId::Bedesten,
        BackendId::AnayasaNorm,
        BackendId::AnayasaBireysel,
        BackendId::Rekabet,
        BackendId::Kvkk,
        BackendId::Bddk,
    ];

    /// Stable id namespace. Changing one invalidates every id already handed out.
    pub fn namespace(self) -> &'static str {
        match self {
            Self::Yargitay => "yargitay",
            Self::Danistay => "danistay",
            Self::Emsal => "emsal",
            Self::Bedesten => "bedesten",
            Self::AnayasaNorm => "anayasa-norm",
            Self::AnayasaBireysel => "anayasa-bb",
            Self::Rekabet => "rekabet",
            Self::Kvkk => "kvkk",
            Self::Bddk => "bddk",
        }
    }

    pub fn from_namespace(namespace: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|backend| backend.namespace() == namespace)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Yargitay => "Yargıtay",
            Self::Danistay => "Danıştay",
            Self::Emsal => "Emsal (UYAP)",
            Self::Bedesten => "Bedesten",
            Self::AnayasaNorm => "Anayasa Mahkemesi (Norm Denetimi)",
            Self::AnayasaBireysel => "Anayasa Mahkemesi (Bireysel Başvuru)",
            Self::Rekabet => "Rekabet Kurumu",
            Self::Kvkk => "KVKK",
            Self::Bddk => "BDDK",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub fn capabilities(self) -> BackendCapabilities {
        match self {
            Self::Yargitay => BackendCapabilities {
                exact_phrase: true,
                date_filter: true,
                max_page_size: 10,
                units: UnitScheme::YargitayChambers,
                formats: &[ContentFormat::Html],
                pdf_paging: PdfPaging::WholeDocument,
                content_selectors: &[],
                schema: KARAR_ARAMA_SCHEMA,
            },
            Self::Danistay => BackendCapabilities {
                exact_phrase: false,
                date_filter: true,
                max_page_size: 10,
                units: UnitScheme::DanistayChambers,
                formats: &[ContentFormat::Html],
                pdf_paging: PdfPaging::WholeDocument,
                content_selectors: &[],
                schema: CompactSchema {
                    unit: &["/daireKurul", "/daire"],
                    ..KARAR_ARAMA_SCHEMA
                },
            },
            Self::Emsal => BackendCapabilities {
                exact_phrase: true,
                date_filter: true,
                max_page_size: 10,
                units: UnitScheme::Unsupported,
                formats: &[ContentFormat::Html],
                pdf_paging: PdfPaging::WholeDocument,
                content_selectors: &[],
                schema: KARAR_ARAMA_SCHEMA,
            },
            Self::Bedesten => BackendCapabilities {
                exact_phrase: true,
                date_filter: true,
                max_page_size: 10,
                units: UnitScheme::BedestenUnits,
                formats: &[ContentFormat::Html],
                pdf_paging: PdfPaging::WholeDocument,
                content_selectors: &[],
                schema: CompactSchema {
                    key: "/documentId",
                    title: &[("", "/itemType/description"), ("E. ", "/esasNo"), ("K. ", "/kararNo")],
                    unit: &["/birimAdi", "/itemType/description"],
                    date: &["/kararTarihi", "/kararTarihiStr"],
                    summary: &[],
                },
            },
            Self::AnayasaNorm => BackendCapabilities {
                exact_phrase: false,
                date_filter: false,
                max_page_size: 10,
                units: UnitScheme::Unsupported,
                formats: &[ContentFormat::Html],
                pdf_paging: PdfPaging::WholeDocument,
                content_selectors: &["div#Karar div.KararMetni", "div#Karar span.kararHtml", "div#Karar", "div.WordSection1"],
                schema: ANAYASA_SCHEMA,
            },
            Self::AnayasaBireysel => BackendCapabilities {
                exact_phrase: false,
                date_filter: false,
                max_page_size: 10,
                units: UnitScheme::Unsupported,
                formats: &[ContentFormat::Html],
                pdf_paging: PdfPaging::WholeDocument,
                content_selectors: &[
                    "div#Karar span.kararHtml div.WordSection1",
                    "div#Karar span.kararHtml",
                    "div#Karar",
                    "div.WordSection1",
                ],
                schema: ANAYASA_SCHEMA,
            },
            Self::Rekabet => BackendCapabilities {
                exact_phrase: false,
                date_filter: false,
                max_page_size: 10,
                units: UnitScheme::RekabetDecisionTypes,
                formats: &[ContentFormat::Pdf, ContentFormat::Html],
                pdf_paging: PdfPaging::PerSourcePage,
                content_selectors: &["div.kararDetay", "div.content"],
                schema: CompactSchema {
                    key: "/kararId",
                    title: &[("", "/title")],
                    unit: &["/kararTuru"],
                    date: &["/kararTarihi", "/yayinlanmaTarihi"],
                    summary: &[("Karar Sayısı: ", "/kararSayisi")],
                },
            },
            Self::Kvkk => BackendCapabilities {
                exact_phrase: true,
                date_filter: false,
                max_page_size: 20,
                units: UnitScheme::Unsupported,
                formats: &[ContentFormat::Html],
                pdf_paging: PdfPaging::WholeDocument,
                content_selectors: &["div.blog-post-inner", "div.blog-post"],
                schema: WEB_SEARCH_SCHEMA,
            },
            Self::Bddk => BackendCapabilities {
                exact_phrase: true,
                date_filter: false,
                max_page_size: 20,
                units: UnitScheme::Unsupported,
                formats: &[ContentFormat::Html],
                pdf_paging: PdfPaging::WholeDocument,
                content_selectors: &["div.icerik", "div#icerik"],
                schema: WEB_SEARCH_SCHEMA,
            },
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace())
    }
}

impl FromStr for BackendId {
    type Err = SearchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::from_namespace(&normalized)
            .or(match normalized.as_str() {
                "anayasa-bireysel" => Some(Self::AnayasaBireysel),
                "anayasa" => Some(Self::AnayasaNorm),
                _ => None,
            })
            .ok_or_else(|| SearchError::UnknownBackend(value.to_string()))
    }
}

/// How a backend delivers PDF decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfPaging {
    WholeDocument,
    /// One source page per fetch; document ids may address a specific page.
    PerSourcePage,
}

/// JSON pointers that lift a raw backend item into a compact result.
///
/// `title` and `summary` parts are `(prefix, pointer)` pairs joined with `", "`;
/// `unit` and `date` take the first non-empty pointer.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CompactSchema {
    pub key: &'static str,
    pub title: &'static [(&'static str, &'static str)],
    pub unit: &'static [&'static str],
    pub date: &'static [&'static str],
    pub summary: &'static [(&'static str, &'static str)],
}

const KARAR_ARAMA_SCHEMA: CompactSchema = CompactSchema {
    key: "/id",
    title: &[("E. ", "/esasNo"), ("K. ", "/kararNo")],
    unit: &["/daire"],
    date: &["/kararTarihi"],
    summary: &[],
};

const ANAYASA_SCHEMA: CompactSchema = CompactSchema {
    key: "/path",
    title: &[("", "/title")],
    unit: &["/unit"],
    date: &["/decisionDate"],
    summary: &[("", "/subject")],
};

const WEB_SEARCH_SCHEMA: CompactSchema = CompactSchema {
    key: "/key",
    title: &[("", "/title")],
    unit: &["/source"],
    date: &["/date"],
    summary: &[("", "/snippet")],
};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BackendCapabilities {
    pub exact_phrase: bool,
    pub date_filter: bool,
    pub max_page_size: u32,
    pub units: UnitScheme,
    /// Retrieval pipelines in preference order.
    pub formats: &'static [ContentFormat],
    pub pdf_paging: PdfPaging,
    pub content_selectors: &'static [&'static str],
    #[serde(skip)]
    pub schema: CompactSchema,
}
