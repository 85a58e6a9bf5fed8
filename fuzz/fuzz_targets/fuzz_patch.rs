#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(patch) = eshop_api::json::parse_json_to_bson_document(s) {
            let upd = eshop_api::query::UpdateDoc::from_patch(patch);
            let mut doc = bson::doc!{"orderNo": 1, "item": "A", "nested": {"z": 3}};
            let _ = eshop_api::query::apply_update(&mut doc, &upd);
            let _ = eshop_api::query::to_mongo_update(&upd);
            let _ = eshop_api::json::document_to_json(doc);
        }
    }
});
