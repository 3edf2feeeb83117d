/// PDF rendering of approved claims
///
/// A small PDF 1.4 writer: A4 pages, the standard Helvetica font, text and
/// rules only. That is all the claim report needs, so no external renderer
/// is involved.

use chrono::{DateTime, Utc};
use claimdesk_shared::models::approval::ApprovalStatus;
use claimdesk_shared::models::claim::ClaimDetail;
use claimdesk_shared::money::format_usd;
use rust_decimal::Decimal;
use std::fmt::Write as _;

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 57.0;
const BOTTOM: f32 = 70.0;

/// Escapes a string for a PDF literal; non-ASCII becomes `?`
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' | '\r' | '\t' => out.push(' '),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

/// One page's content stream
#[derive(Debug, Default, Clone)]
pub struct Page {
    content: String,
}

impl Page {
    /// Draws `text` with its baseline at `y` points from the top
    pub fn text(&mut self, x: f32, y: f32, size: f32, text: &str) {
        let _ = writeln!(
            self.content,
            "BT /F1 {size:.1} Tf {x:.2} {:.2} Td ({}) Tj ET",
            PAGE_HEIGHT - y,
            escape(text)
        );
    }

    /// Horizontal rule at `y` points from the top
    pub fn rule(&mut self, x1: f32, x2: f32, y: f32) {
        let y = PAGE_HEIGHT - y;
        let _ = writeln!(self.content, "0.5 w {x1:.2} {y:.2} m {x2:.2} {y:.2} l S");
    }
}

/// Pages assembled into a single PDF file
#[derive(Debug, Default, Clone)]
pub struct PdfDocument {
    pages: Vec<Page>,
}

impl PdfDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, page: Page) {
        self.pages.push(page);
    }

    /// Serializes the document with a valid cross-reference table
    pub fn render(&self) -> Vec<u8> {
        // 1: catalog, 2: page tree, 3: font, then a page/content pair per page
        let mut objects: Vec<String> = Vec::with_capacity(3 + self.pages.len() * 2);

        let kids = (0..self.pages.len())
            .map(|i| format!("{} 0 R", 4 + i * 2))
            .collect::<Vec<_>>()
            .join(" ");

        objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
        objects.push(format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids,
            self.pages.len()
        ));
        objects.push(
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
                .to_string(),
        );

        for (i, page) in self.pages.iter().enumerate() {
            let content_id = 5 + i * 2;
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {content_id} 0 R >>"
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}endstream",
                page.content.len(),
                page.content
            ));
        }

        let mut out = String::from("%PDF-1.4\n");
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, object) in objects.iter().enumerate() {
            offsets.push(out.len());
            let _ = write!(out, "{} 0 obj\n{}\nendobj\n", i + 1, object);
        }

        let xref_start = out.len();
        let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            let _ = write!(out, "{:010} 00000 n \n", offset);
        }
        let _ = write!(
            out,
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_start
        );

        out.into_bytes()
    }
}

/// Formats an amount in the claim's currency
pub fn format_amount(amount: Decimal, currency: &str) -> String {
    if currency == "USD" {
        format_usd(amount)
    } else {
        format!("{:.2} {}", amount.round_dp(2), currency)
    }
}

/// Lays text out top to bottom, starting a new page when one fills up
struct Cursor {
    doc: PdfDocument,
    page: Page,
    y: f32,
}

impl Cursor {
    fn new() -> Self {
        Self {
            doc: PdfDocument::new(),
            page: Page::default(),
            y: 85.0,
        }
    }

    fn ensure_room(&mut self, needed: f32) {
        if self.y + needed > PAGE_HEIGHT - BOTTOM {
            let full = std::mem::take(&mut self.page);
            self.doc.push(full);
            self.y = MARGIN;
        }
    }

    fn line(&mut self, size: f32, text: &str) {
        self.ensure_room(size + 6.0);
        self.page.text(MARGIN, self.y, size, text);
        self.y += size + 16.0;
    }

    fn gap(&mut self, points: f32) {
        self.y += points;
    }

    fn finish(mut self, footer: &str) -> PdfDocument {
        self.page.text(MARGIN, PAGE_HEIGHT - 48.0, 8.0, footer);
        self.doc.push(self.page);
        self.doc
    }
}

/// Renders the claim report offered for download
///
/// Lists claim details, the owner, every item and the approving decision.
pub fn render_claim_report(detail: &ClaimDetail, generated_at: DateTime<Utc>) -> Vec<u8> {
    let claim = &detail.claim;
    let mut cursor = Cursor::new();

    cursor.line(20.0, "Expense Claim Report");
    cursor.gap(12.0);

    cursor.line(12.0, &format!("Claim ID: {}", claim.id));
    cursor.line(12.0, &format!("Title: {}", claim.title));
    cursor.line(
        12.0,
        &format!("Description: {}", claim.description.as_deref().unwrap_or("N/A")),
    );
    cursor.line(12.0, &format!("Status: {}", claim.status));
    cursor.line(
        12.0,
        &format!("Total Amount: {}", format_amount(claim.total_amount, &claim.currency)),
    );
    cursor.line(12.0, &format!("Expense Date: {}", claim.expense_date.format("%Y-%m-%d")));
    cursor.gap(12.0);

    cursor.line(12.0, &format!("Employee: {}", detail.user.name));
    cursor.line(12.0, &format!("Email: {}", detail.user.email));
    cursor.line(
        12.0,
        &format!(
            "Department: {}",
            detail.user.department_name.as_deref().unwrap_or("N/A")
        ),
    );

    if !detail.items.is_empty() {
        cursor.gap(12.0);
        cursor.line(14.0, "Expense Items:");

        cursor.ensure_room(30.0);
        let header_y = cursor.y;
        cursor.page.text(MARGIN, header_y, 10.0, "Description");
        cursor.page.text(255.0, header_y, 10.0, "Category");
        cursor.page.text(425.0, header_y, 10.0, "Amount");
        cursor.page.rule(MARGIN, 510.0, header_y + 6.0);
        cursor.y += 26.0;

        for item in &detail.items {
            cursor.ensure_room(16.0);
            let y = cursor.y;
            let description: String = item.description.chars().take(38).collect();
            cursor.page.text(MARGIN, y, 10.0, &description);
            cursor.page.text(255.0, y, 10.0, item.category.label());
            cursor
                .page
                .text(425.0, y, 10.0, &format_amount(item.amount, &claim.currency));
            cursor.y += 22.0;
        }
    }

    if let Some(approval) = detail
        .approvals
        .iter()
        .find(|a| a.status == ApprovalStatus::Approved)
    {
        cursor.gap(12.0);
        cursor.line(12.0, "Approval Details:");
        cursor.line(12.0, &format!("Approved by: {}", approval.approver_name));
        cursor.line(
            12.0,
            &format!(
                "Approved on: {}",
                approval
                    .approved_at
                    .map(|at| at.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "N/A".to_string())
            ),
        );
        if let Some(comments) = &approval.comments {
            cursor.line(12.0, &format!("Comments: {}", comments));
        }
    }

    let footer = format!("Generated on: {}", generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    cursor.finish(&footer).render()
}

/// Download file name for a claim report
pub fn report_filename(claim_id: uuid::Uuid) -> String {
    format!("expense-claim-{}.pdf", claim_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use claimdesk_shared::models::approval::ApprovalWithApprover;
    use claimdesk_shared::models::claim::{
        ClaimOwner, ClaimStatus, ExpenseCategory, ExpenseClaim, ExpenseItem,
    };
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 2, 9, 30, 0).unwrap()
    }

    fn detail(item_count: usize) -> ClaimDetail {
        let claim_id = Uuid::new_v4();
        let owner_id = Uuid::new_v4();
        let approver_id = Uuid::new_v4();

        ClaimDetail {
            claim: ExpenseClaim {
                id: claim_id,
                title: "Berlin (offsite)".to_string(),
                description: None,
                total_amount: "1234.5".parse().unwrap(),
                currency: "USD".to_string(),
                status: ClaimStatus::Approved,
                expense_date: NaiveDate::from_ymd_opt(2025, 3, 28).unwrap(),
                submitted_at: Some(now()),
                user_id: owner_id,
                created_at: now(),
                updated_at: now(),
            },
            user: ClaimOwner {
                id: owner_id,
                name: "Dana Kim".to_string(),
                email: "dana@example.com".to_string(),
                department_name: Some("Engineering".to_string()),
                manager_id: Some(approver_id),
            },
            items: (0..item_count)
                .map(|i| ExpenseItem {
                    id: Uuid::new_v4(),
                    claim_id,
                    description: format!("Item {}", i + 1),
                    amount: "10.00".parse().unwrap(),
                    category: ExpenseCategory::OfficeSupplies,
                    created_at: now(),
                    updated_at: now(),
                })
                .collect(),
            receipts: Vec::new(),
            approvals: vec![ApprovalWithApprover {
                id: Uuid::new_v4(),
                claim_id,
                approver_id,
                approver_name: "Sam Ortiz".to_string(),
                approver_email: "sam@example.com".to_string(),
                status: ApprovalStatus::Approved,
                comments: Some("Fine".to_string()),
                approved_at: Some(now()),
                created_at: now(),
            }],
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a (b) \\ c"), "a \\(b\\) \\\\ c");
        assert_eq!(escape("caf\u{e9}\nbar"), "caf? bar");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount("1234.5".parse().unwrap(), "USD"), "$1,234.50");
        assert_eq!(format_amount("99.999".parse().unwrap(), "EUR"), "100.00 EUR");
    }

    #[test]
    fn test_report_contents() {
        let bytes = render_claim_report(&detail(2), now());
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.trim_end().ends_with("%%EOF"));
        assert!(text.contains("(Expense Claim Report)"));
        assert!(text.contains("(Title: Berlin \\(offsite\\))"));
        assert!(text.contains("(Description: N/A)"));
        assert!(text.contains("(Total Amount: $1,234.50)"));
        assert!(text.contains("(Department: Engineering)"));
        assert!(text.contains("(Office Supplies)"));
        assert!(text.contains("(Approved by: Sam Ortiz)"));
        assert!(text.contains("(Comments: Fine)"));
        assert!(text.contains("(Generated on: 2025-04-02 09:30:00 UTC)"));
    }

    #[test]
    fn test_long_reports_span_pages() {
        let bytes = render_claim_report(&detail(20), now());
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("/Count 2"));
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let text = String::from_utf8(render_claim_report(&detail(1), now())).unwrap();

        let xref = text.find("xref\n").unwrap();
        let startxref: usize = text
            .split("startxref\n")
            .nth(1)
            .and_then(|rest| rest.lines().next())
            .and_then(|n| n.parse().ok())
            .unwrap();
        assert_eq!(startxref, xref);

        for (i, line) in text[xref..].lines().skip(3).take(3).enumerate() {
            let offset: usize = line[..10].parse().unwrap();
            assert!(text[offset..].starts_with(&format!("{} 0 obj", i + 1)));
        }
    }

    #[test]
    fn test_report_filename() {
        let id = Uuid::nil();
        assert_eq!(
            report_filename(id),
            "expense-claim-00000000-0000-0000-0000-000000000000.pdf"
        );
    }
}
