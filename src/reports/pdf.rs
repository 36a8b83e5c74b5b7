use chrono::NaiveDateTime;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use rust_decimal::Decimal;

use super::ReportError;
use crate::model::payroll::Payslip;

const PAGE_WIDTH: i32 = 595;
const PAGE_HEIGHT: i32 = 842;
const MARGIN: i32 = 50;
const AMOUNT_X: i32 = 420;

const FONT_REGULAR: &str = "F1";
const FONT_BOLD: &str = "F2";

/// Accumulates drawing operations for a single page, top to bottom.
struct PageWriter {
    ops: Vec<Operation>,
    y: i32,
}

impl PageWriter {
    fn new() -> Self {
        Self {
            ops: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn text_at(&mut self, x: i32, y: i32, font: &str, size: i32, text: &str) {
        self.ops.push(Operation::new("BT", vec![]));
        self.ops
            .push(Operation::new("Tf", vec![font.into(), size.into()]));
        self.ops.push(Operation::new("Td", vec![x.into(), y.into()]));
        self.ops
            .push(Operation::new("Tj", vec![Object::string_literal(text)]));
        self.ops.push(Operation::new("ET", vec![]));
    }

    fn line(&mut self, font: &str, size: i32, text: &str) {
        self.text_at(MARGIN, self.y, font, size, text);
        self.y -= size + 6;
    }

    fn rule(&mut self) {
        let y = self.y + 4;
        self.ops.push(Operation::new("w", vec![1.into()]));
        self.ops.push(Operation::new("m", vec![MARGIN.into(), y.into()]));
        self.ops
            .push(Operation::new("l", vec![(PAGE_WIDTH - MARGIN).into(), y.into()]));
        self.ops.push(Operation::new("S", vec![]));
        self.y -= 10;
    }

    fn gap(&mut self, points: i32) {
        self.y -= points;
    }

    fn label_value(&mut self, label: &str, value: &str) {
        self.text_at(MARGIN + 10, self.y, FONT_BOLD, 10, label);
        self.text_at(MARGIN + 150, self.y, FONT_REGULAR, 10, value);
        self.y -= 16;
    }

    /// A titled two-column table of (description, amount) rows with a bold last row.
    fn amount_table(&mut self, title: &str, rows: &[(&str, Decimal)]) {
        self.line(FONT_BOLD, 12, title);
        self.text_at(MARGIN + 10, self.y, FONT_BOLD, 10, "Description");
        self.text_at(AMOUNT_X, self.y, FONT_BOLD, 10, "Amount (INR)");
        self.y -= 6;
        self.rule();
        for (i, (label, amount)) in rows.iter().enumerate() {
            let last = i + 1 == rows.len();
            if last {
                self.rule();
            }
            let font = if last { FONT_BOLD } else { FONT_REGULAR };
            self.text_at(MARGIN + 10, self.y, font, 10, label);
            self.text_at(AMOUNT_X, self.y, font, 10, &format_amount(*amount));
            self.y -= 16;
        }
        self.gap(12);
    }
}

pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

/// Renders a one-page payslip. `generated_at` is printed in the footer and
/// stored as the document creation date; the output depends on nothing else,
/// so identical inputs give identical bytes.
pub fn render_payslip_pdf(payslip: &Payslip, generated_at: NaiveDateTime) -> Result<Vec<u8>, ReportError> {
    let payroll = &payslip.payroll;
    let mut page = PageWriter::new();

    // header
    page.line(FONT_BOLD, 18, &payslip.company_name);
    page.line(
        FONT_REGULAR,
        12,
        &format!("Payslip for {}", payroll.month.format("%B %Y")),
    );
    page.rule();

    // employee block
    page.label_value("Employee Code", &payslip.employee_code);
    page.label_value("Employee Name", &payslip.employee_name);
    page.label_value("Department", &payslip.department);
    page.label_value("Designation", &payslip.designation);
    page.label_value("Financial Year", &payroll.financial_year);
    page.gap(12);

    let e = &payroll.earnings;
    page.amount_table(
        "Earnings",
        &[
            ("Basic Salary", e.basic),
            ("House Rent Allowance", e.hra),
            ("Other Allowances", e.allowances),
            ("Bonus", e.bonus),
            ("Overtime", e.overtime),
            ("Total Earnings", payroll.summary.gross),
        ],
    );

    let d = &payroll.deductions;
    page.amount_table(
        "Deductions",
        &[
            ("Provident Fund (PF)", d.pf),
            ("ESIC", d.esic),
            ("Tax Deducted at Source (TDS)", d.tax),
            ("Recoveries", d.recoveries),
            ("Total Deductions", payroll.summary.deductions),
        ],
    );

    page.amount_table(
        "Summary",
        &[
            ("Gross Pay", payroll.summary.gross),
            ("Total Deductions", payroll.summary.deductions),
            ("Net Pay", payroll.summary.net),
        ],
    );

    // footer
    page.text_at(
        MARGIN,
        MARGIN,
        FONT_REGULAR,
        8,
        &format!(
            "Generated on {} UTC. This is a computer generated payslip and needs no signature.",
            generated_at.format("%Y-%m-%d %H:%M:%S")
        ),
    );

    build_document(page.ops, &payslip.company_name, generated_at)
}

fn build_document(
    ops: Vec<Operation>,
    title: &str,
    generated_at: NaiveDateTime,
) -> Result<Vec<u8>, ReportError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            FONT_REGULAR => regular_id,
            FONT_BOLD => bold_id,
        },
    });

    let content = Content { operations: ops };
    let encoded = content
        .encode()
        .map_err(|e| ReportError::Pdf(e.to_string()))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let stamp = generated_at.format("D:%Y%m%d%H%M%SZ").to_string();
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(format!("{title} Payslip")),
        "Producer" => Object::string_literal("hrms"),
        "CreationDate" => Object::string_literal(stamp),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ReportError::Pdf(e.to_string()))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::payroll::{Deductions, Earnings, Payroll, PayrollSummary};
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn payslip() -> Payslip {
        Payslip {
            company_name: "Acme Corporation".into(),
            employee_code: "EMP-004".into(),
            employee_name: "Esha Verma".into(),
            department: "Engineering".into(),
            designation: "Software Engineer".into(),
            payroll: Payroll {
                id: 11,
                employee_id: 4,
                month: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                financial_year: "2025-2026".into(),
                earnings: Earnings {
                    basic: dec("50000"),
                    hra: dec("20000"),
                    allowances: dec("5000"),
                    bonus: dec("0"),
                    overtime: dec("0"),
                },
                deductions: Deductions {
                    pf: dec("1800"),
                    esic: dec("0"),
                    tax: dec("4500"),
                    recoveries: dec("0"),
                },
                summary: PayrollSummary {
                    gross: dec("75000"),
                    deductions: dec("6300"),
                    net: dec("68700"),
                },
                status: "processed".into(),
                created_at: Utc.with_ymd_and_hms(2026, 1, 31, 0, 0, 0).unwrap(),
            },
        }
    }

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack
            .windows(needle.len())
            .any(|w| w == needle.as_bytes())
    }

    #[test]
    fn output_is_a_pdf() {
        let bytes = render_payslip_pdf(&payslip(), at(9)).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
    }

    #[test]
    fn identical_input_gives_identical_bytes() {
        let first = render_payslip_pdf(&payslip(), at(9)).unwrap();
        let second = render_payslip_pdf(&payslip(), at(9)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn timestamp_changes_the_output() {
        let first = render_payslip_pdf(&payslip(), at(9)).unwrap();
        let later = render_payslip_pdf(&payslip(), at(10)).unwrap();
        assert_ne!(first, later);
    }

    #[test]
    fn layout_contains_every_section() {
        let bytes = render_payslip_pdf(&payslip(), at(9)).unwrap();
        for text in [
            "Acme Corporation",
            "Payslip for January 2026",
            "Esha Verma",
            "Earnings",
            "Deductions",
            "Summary",
            "Net Pay",
            "68700.00",
            "Generated on 2026-02-01 09:00:00 UTC",
        ] {
            assert!(contains(&bytes, text), "missing {text}");
        }
    }

    #[test]
    fn amounts_have_two_decimals() {
        assert_eq!(format_amount(dec("1800")), "1800.00");
        assert_eq!(format_amount(dec("12.5")), "12.50");
    }
}
