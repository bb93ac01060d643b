//! Built-in bank contact directory.
//!
//! Indexed next to the product documents so "what is the call centre
//! number?" style questions are answered from the corpus. The document has
//! no product and no section label, so every predicate admits it.

use crate::models::Document;
use chrono::Utc;
use sha2::{Digest, Sha256};

pub const CONTACTS_SOURCE: &str = "National Bank Contact Information";

const CONTACTS_DOCUMENT_ID: &str = "builtin-contacts";

pub const CONTACTS_TEXT: &str = "\
CALL CENTRE
Call Centre phone number: 626 (short code).
Call Centre email: callcentre@natbankmw.com
Main head office phone number: (265) 111 820 622
Comments and feedback email: clientcoverage@natbankmw.com

HEAD OFFICE CONTACTS
Head Office: chiefexec@natbankmw.com, Phone: (265) 111 820 622
Digital Financial Services Division: digitalfs@natbankmw.com, Phone: (265) 111 820 622
Credit Management Division: cmanagement@natbankmw.com, Phone: (265) 111 820 622
Retail Banking Division: retailbanking@natbankmw.com, Phone: (265) 111 820 622
Corporate Banking Division: cibd@natbankmw.com, Phone: (265) 111 824 907
Treasury and Investment Banking: treasury@natbankmw.com, Phone: (265) 111 820 622
Marketing and Corporate Affairs: marketing@natbankmw.com, Phone: (265) 111 820 622
Client Coverage Division: clientcoverage@natbankmw.com, Phone: (265) 111 820 622

BRANCHES IN THE SOUTH
Henderson Street Service Centre (Blantyre): hendersonstreet@natbankmw.com, Phone: (265) 111 821 000
Victoria Avenue Service Centre (Blantyre): vicavenue@natbankmw.com, Phone: (265) 111 820 199
Chichiri Service Centre: chichiri@natbankmw.com, Phone: (265) 111 810 900
Top Mandala: topmandala@natbankmw.com, Phone: (265) 111 820 950
Zomba Service Centre: zomba@natbankmw.com, Phone: (265) 111 524 788
Mulanje Service Centre: mulanje@natbankmw.com, Phone: (265) 999 978 552
Thyolo Service Centre: thyolo@natbankmw.com, Phone: (265) 111 473 234
Mangochi Service Centre: mangochi@natbankmw.com, Phone: (265) 111 594 322
Liwonde Service Centre: liwonde@natbankmw.com, Phone: (265) 111 542 866
Nchalo Service Centre: nchalo@natbankmw.com, Phone: (265) 111 428 252

BRANCHES IN THE CENTRE AND NORTH
Lilongwe Service Centre: lilongwe@natbankmw.com, Phone: (265) 111 757 016
Capital City Service Centre: capitalcity@natbankmw.com, Phone: (265) 111 770 322
Lilongwe Gateway: lilongwegateway@natbankmw.com, Phone: (265) 111 762 954
Kanengo Service Centre: kanengo@natbankmw.com, Phone: (265) 111 710 193
Kasungu Service Centre: kasungu@natbankmw.com, Phone: (265) 111 253 224
Salima Service Centre: salima@natbankmw.com, Phone: (265) 111 262 811
Mzuzu Service Centre: mzuzu@natbankmw.com, Phone: (265) 111 312 554
Karonga Service Centre: karonga@natbankmw.com, Phone: (265) 111 362 223
Mzimba Service Centre: mzimba@natbankmw.com, Phone: (265) 111 342 245

WEBSITE
Contact us online at https://www.natbank.co.mw/contact-us
";

/// The directory as an ingested document without a product.
pub fn contacts_document() -> Document {
    let mut hasher = Sha256::new();
    hasher.update(CONTACTS_TEXT.as_bytes());

    Document {
        document_id: CONTACTS_DOCUMENT_ID.to_string(),
        source_filename: CONTACTS_SOURCE.to_string(),
        raw_text: CONTACTS_TEXT.to_string(),
        product_id: None,
        checksum: format!("{:x}", hasher.finalize()),
        ingested_at: Utc::now(),
    }
}
