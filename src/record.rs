use serde::Serialize;

use crate::errors::{AppError, AppResult};

pub const BUSINESS_NAME_COLUMN: &str = "Business Name";
pub const ADDRESS_COLUMN: &str = "Address";
pub const TELEPHONE_COLUMN: &str = "Telephone";
pub const REQUIRED_COLUMNS: [&str; 3] = [BUSINESS_NAME_COLUMN, ADDRESS_COLUMN, TELEPHONE_COLUMN];

pub const MAPS_URL_COLUMN: &str = "Maps URL";
pub const REVIEW_SCORE_COLUMN: &str = "Review Score";
pub const ABOUT_SECTION_COLUMN: &str = "About Section";
pub const STATUS_COLUMN: &str = "Status";
pub const ERROR_MESSAGE_COLUMN: &str = "Error Message";
pub const DERIVED_COLUMNS: [&str; 5] = [
    MAPS_URL_COLUMN,
    REVIEW_SCORE_COLUMN,
    ABOUT_SECTION_COLUMN,
    STATUS_COLUMN,
    ERROR_MESSAGE_COLUMN,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProcessingStatus {
    Success,
    PartialNoMapsData,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Success => "Success",
            ProcessingStatus::PartialNoMapsData => "PartialNoMapsData",
            ProcessingStatus::Failed => "Failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "Success" => Some(ProcessingStatus::Success),
            "PartialNoMapsData" => Some(ProcessingStatus::PartialNoMapsData),
            "Failed" => Some(ProcessingStatus::Failed),
            _ => None,
        }
    }
}

/// One business row: the raw input cells plus the enrichment outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessRecord {
    pub row_number: usize,
    pub business_name: String,
    pub address: String,
    pub telephone: Option<String>,
    pub maps_url: Option<String>,
    pub review_score: Option<f64>,
    pub about_section: Option<String>,
    pub status: Option<ProcessingStatus>,
    pub error_message: Option<String>,
    cells: Vec<String>,
}

impl BusinessRecord {
    pub fn is_finalized(&self) -> bool {
        self.status.is_some()
    }

    pub fn mark_success(&mut self, maps_url: String, review_score: Option<f64>, about: String) {
        self.maps_url = Some(maps_url);
        self.review_score = review_score;
        self.about_section = Some(about);
        self.status = Some(ProcessingStatus::Success);
        self.error_message = None;
    }

    pub fn mark_partial(&mut self, about: String) {
        self.maps_url = None;
        self.review_score = None;
        self.about_section = Some(about);
        self.status = Some(ProcessingStatus::PartialNoMapsData);
        self.error_message = None;
    }

    /// Map data already folded into the record stays in place for diagnostics.
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.about_section = None;
        self.status = Some(ProcessingStatus::Failed);
        self.error_message = Some(if message.trim().is_empty() {
            "unknown error".to_string()
        } else {
            message
        });
    }

    fn derived_value(&self, column: &str) -> String {
        match column {
            MAPS_URL_COLUMN => self.maps_url.clone().unwrap_or_default(),
            REVIEW_SCORE_COLUMN => self
                .review_score
                .map(|score| score.to_string())
                .unwrap_or_default(),
            ABOUT_SECTION_COLUMN => self.about_section.clone().unwrap_or_default(),
            STATUS_COLUMN => self
                .status
                .map(|status| status.as_str().to_string())
                .unwrap_or_default(),
            ERROR_MESSAGE_COLUMN => self.error_message.clone().unwrap_or_default(),
            _ => String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Input(usize),
    Derived(&'static str),
}

/// Output column order: every input header in place, then any derived
/// column the input did not already carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    headers: Vec<String>,
    columns: Vec<Column>,
    input_width: usize,
    name_index: usize,
    address_index: usize,
    telephone_index: usize,
}

impl TableLayout {
    pub fn from_headers(input_headers: Vec<String>) -> AppResult<Self> {
        let input_headers: Vec<String> = input_headers
            .into_iter()
            .map(|header| header.trim().to_string())
            .collect();

        let position = |name: &str| input_headers.iter().position(|header| header == name);
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| position(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(AppError::MissingColumns(missing));
        }

        let name_index = position(BUSINESS_NAME_COLUMN).unwrap_or_default();
        let address_index = position(ADDRESS_COLUMN).unwrap_or_default();
        let telephone_index = position(TELEPHONE_COLUMN).unwrap_or_default();

        let mut columns: Vec<Column> = input_headers
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                match DERIVED_COLUMNS
                    .iter()
                    .find(|derived| **derived == header.as_str())
                {
                    Some(derived) => Column::Derived(*derived),
                    None => Column::Input(idx),
                }
            })
            .collect();
        let input_width = input_headers.len();
        let mut headers = input_headers.clone();
        for derived in DERIVED_COLUMNS {
            if !input_headers.iter().any(|header| header == derived) {
                headers.push(derived.to_string());
                columns.push(Column::Derived(derived));
            }
        }

        Ok(Self {
            headers,
            columns,
            input_width,
            name_index,
            address_index,
            telephone_index,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Builds a record from one input row; short rows are padded with blanks.
    pub fn record_from_cells(&self, row_number: usize, mut cells: Vec<String>) -> BusinessRecord {
        if cells.len() < self.input_width {
            cells.resize(self.input_width, String::new());
        }

        let cell = |idx: usize| cells.get(idx).map(|v| v.trim().to_string()).unwrap_or_default();
        let existing = |name: &str| {
            self.headers
                .iter()
                .position(|header| header == name)
                .filter(|idx| *idx < self.input_width)
                .and_then(|idx| cells.get(idx))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        BusinessRecord {
            row_number,
            business_name: cell(self.name_index),
            address: cell(self.address_index),
            telephone: Some(cell(self.telephone_index)).filter(|v| !v.is_empty()),
            maps_url: existing(MAPS_URL_COLUMN),
            review_score: existing(REVIEW_SCORE_COLUMN).and_then(|v| v.parse().ok()),
            about_section: existing(ABOUT_SECTION_COLUMN),
            status: existing(STATUS_COLUMN).and_then(|v| ProcessingStatus::parse(&v)),
            error_message: existing(ERROR_MESSAGE_COLUMN),
            cells,
        }
    }

    pub fn row_values(&self, record: &BusinessRecord) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| match column {
                Column::Input(idx) => record.cells.get(*idx).cloned().unwrap_or_default(),
                Column::Derived(name) => record.derived_value(name),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    layout: TableLayout,
    records: Vec<BusinessRecord>,
}

impl RecordSet {
    pub fn new(layout: TableLayout, records: Vec<BusinessRecord>) -> Self {
        Self { layout, records }
    }

    pub fn layout(&self) -> &TableLayout {
        &self.layout
    }

    pub fn records(&self) -> &[BusinessRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [BusinessRecord] {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        self.records
            .iter()
            .map(move |record| self.layout.row_values(record))
    }
}
