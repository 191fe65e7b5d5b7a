//! Starter mappings for an empty store.

use crate::domain::{CategoryMapping, MappingStore, StoreResult, normalize_text};

/// Confidence given to every seeded mapping.
const SEED_CONFIDENCE: f64 = 0.9;

type SeedRow = (&'static str, &'static str, &'static [&'static str], &'static [&'static str]);

const ENGLISH: &[SeedRow] = &[
    ("food", "Food & Dining", &["meal", "eat", "dining"], &["food.*", "eat.*", "meal.*"]),
    ("restaurant", "Food & Dining", &["cafe", "diner", "eatery"], &["restaurant.*", "cafe.*"]),
    ("coffee", "Food & Dining", &["starbucks", "cafe", "espresso"], &["coffee.*", "starbucks.*"]),
    ("lunch", "Food & Dining", &["dinner", "breakfast"], &["lunch.*", "dinner.*", "breakfast.*"]),
    ("pizza", "Food & Dining", &["dominos", "pizza hut"], &["pizza.*"]),
    ("burger", "Food & Dining", &["mcdonalds", "burger king", "kfc"], &["burger.*", "mcdonald.*", "kfc.*"]),
    ("taxi", "Transportation", &["uber", "grab", "lyft"], &["taxi.*", "uber.*", "grab.*"]),
    ("bus", "Transportation", &["public transport", "transit"], &["bus.*", "transit.*"]),
    ("train", "Transportation", &["railway", "subway", "metro"], &["train.*", "railway.*", "subway.*", "metro.*"]),
    ("gas", "Transportation", &["fuel", "petrol", "gasoline"], &["gas.*", "fuel.*", "petrol.*"]),
    ("parking", "Transportation", &["car park"], &["parking.*"]),
    ("shopping", "Shopping", &["shop", "store", "mall"], &["shop.*", "store.*", "mall.*"]),
    ("clothes", "Shopping", &["clothing", "fashion", "apparel"], &["cloth.*", "fashion.*", "apparel.*"]),
    ("electronics", "Shopping", &["gadgets", "tech"], &["electronic.*", "gadget.*", "tech.*"]),
    ("hotel", "Travel", &["accommodation", "lodging", "resort"], &["hotel.*", "resort.*", "lodging.*"]),
    ("flight", "Travel", &["airline", "airplane"], &["flight.*", "airline.*", "airplane.*"]),
    ("booking", "Travel", &["reservation"], &["booking.*", "reservation.*"]),
    ("grocery", "Groceries", &["supermarket", "market"], &["grocery.*", "supermarket.*", "market.*"]),
    ("walmart", "Groceries", &["target", "costco"], &["walmart.*", "target.*", "costco.*"]),
    ("hospital", "Healthcare", &["medical", "clinic"], &["hospital.*", "medical.*", "clinic.*"]),
    ("pharmacy", "Healthcare", &["medicine", "drug store"], &["pharmacy.*", "medicine.*", "drug.*"]),
    ("doctor", "Healthcare", &["physician", "dentist"], &["doctor.*", "physician.*", "dentist.*"]),
    ("movie", "Entertainment", &["cinema", "theater"], &["movie.*", "cinema.*", "theater.*"]),
    ("game", "Entertainment", &["gaming", "video game"], &["game.*", "gaming.*"]),
    ("music", "Entertainment", &["concert", "spotify"], &["music.*", "concert.*", "spotify.*"]),
    ("electric", "Utilities", &["electricity", "power"], &["electric.*", "power.*"]),
    ("water", "Utilities", &["utility"], &["water.*"]),
    ("internet", "Utilities", &["wifi", "broadband"], &["internet.*", "wifi.*", "broadband.*"]),
    ("phone", "Utilities", &["mobile", "cell"], &["phone.*", "mobile.*", "cell.*"]),
];

const THAI: &[SeedRow] = &[
    ("อาหาร", "Food & Dining", &["กิน", "ทาน", "เสวย"], &["อาหาร.*", "กิน.*", "ทาน.*"]),
    ("ร้านอาหาร", "Food & Dining", &["ร้าน", "ภัตตาคาร"], &["ร้านอาหาร.*", "ภัตตาคาร.*"]),
    ("กาแฟ", "Food & Dining", &["สตาร์บัคส์", "คาเฟ่"], &["กาแฟ.*", "สตาร์บัคส์.*", "คาเฟ่.*"]),
    ("ข้าว", "Food & Dining", &["อาหารเที่ยง", "อาหารเย็น"], &["ข้าว.*", "อาหารเที่ยง.*", "อาหารเย็น.*"]),
    ("แท็กซี่", "Transportation", &["รถแท็กซี่", "วิน"], &["แท็กซี่.*", "วิน.*"]),
    ("รถเมล์", "Transportation", &["รถประจำทาง", "รถบัส"], &["รถเมล์.*", "รถประจำทาง.*", "รถบัส.*"]),
    ("รถไฟ", "Transportation", &["รถไฟฟ้า", "BTS", "MRT"], &["รถไฟ.*", "BTS.*", "MRT.*"]),
    ("น้ำมัน", "Transportation", &["เชื้อเฟื้อง"], &["น้ำมัน.*", "เชื้อเฟื้อง.*"]),
    ("ซื้อของ", "Shopping", &["ช้อป", "ช้อปปิ้ง"], &["ซื้อของ.*", "ช้อป.*", "ช้อปปิ้ง.*"]),
    ("เสื้อผ้า", "Shopping", &["แฟชั่น"], &["เสื้อผ้า.*", "แฟชั่น.*"]),
    ("ห้าง", "Shopping", &["ห้างสรรพสินค้า", "เซ็นทรัล"], &["ห้าง.*", "เซ็นทรัล.*"]),
    ("โรงแรม", "Travel", &["ที่พัก", "รีสอร์ท"], &["โรงแรม.*", "ที่พัก.*", "รีสอร์ท.*"]),
    ("เที่ยวบิน", "Travel", &["สายการบิน"], &["เที่ยวบิน.*", "สายการบิน.*"]),
    ("จอง", "Travel", &["จองห้อง"], &["จอง.*"]),
    ("ตลาด", "Groceries", &["ซุปเปอร์มาร์เก็ต"], &["ตลาด.*", "ซุปเปอร์.*"]),
    ("เซเว่น", "Groceries", &["7-11", "เทสโก้", "บิ๊กซี"], &["เซเว่น.*", "7-11.*", "เทสโก้.*", "บิ๊กซี.*"]),
    ("โรงพยาบาล", "Healthcare", &["หมอ", "คลินิก"], &["โรงพยาบาล.*", "หมอ.*", "คลินิก.*"]),
    ("ร้านยา", "Healthcare", &["ยา"], &["ร้านยา.*", "ยา.*"]),
    ("หนัง", "Entertainment", &["โรงหนัง", "ภาพยนตร์"], &["หนัง.*", "โรงหนัง.*", "ภาพยนตร์.*"]),
    ("เกม", "Entertainment", &["เกมส์"], &["เกม.*"]),
    ("ดนตรี", "Entertainment", &["คอนเสิร์ต"], &["ดนตรี.*", "คอนเสิร์ต.*"]),
    ("ไฟฟ้า", "Utilities", &["กระแสไฟฟ้า"], &["ไฟฟ้า.*"]),
    ("น้ำประปา", "Utilities", &["น้ำ"], &["น้ำประปา.*", "น้ำ.*"]),
    ("อินเทอร์เน็ต", "Utilities", &["เน็ต", "wifi"], &["อินเทอร์เน็ต.*", "เน็ต.*", "wifi.*"]),
    ("โทรศัพท์", "Utilities", &["มือถือ"], &["โทรศัพท์.*", "มือถือ.*"]),
];

/// Built-in English and Thai mappings.
pub fn default_mappings() -> Vec<CategoryMapping> {
    [("en", ENGLISH), ("th", THAI)]
        .into_iter()
        .flat_map(|(language, rows)| {
            rows.iter().map(move |(key, category, aliases, patterns)| {
                CategoryMapping::new(normalize_text(key), language, *category, SEED_CONFIDENCE)
                    .with_aliases(aliases.iter().map(|alias| normalize_text(alias)))
                    .with_patterns(patterns.iter().copied())
                    .with_created_by(Some("seed".to_string()))
            })
        })
        .collect()
}

/// Inserts the built-in mappings when the store has no active mappings.
///
/// Returns how many mappings were written; zero if the store was already populated.
pub async fn seed_default_mappings(store: &dyn MappingStore) -> StoreResult<usize> {
    let existing = store.get_all_active_mappings(None).await?;
    if !existing.is_empty() {
        log::info!("Found {} active mappings, skipping seed", existing.len());
        return Ok(0);
    }
    let created = store.bulk_create_mappings(&default_mappings()).await?;
    log::info!("Seeded {} default category mappings", created);
    Ok(created)
}
