#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 4096 { return; }
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(q) = eshop_api::query::SearchQuery::parse(Some(s)) {
            let filter = q.to_filter();
            let _ = eshop_api::query::to_mongo_filter(&filter);
            let docs = [
                bson::doc! {
                    "title": "Beach Camp", "location": "Nice", "price": 120, "availableSpaces": 8,
                },
                bson::doc!{"title": "City120 Tour", "price": 40.5, "availableSpaces": "n/a"},
                bson::doc!{"price": [1, 2], "availableSpaces": {"left": 3}}
            ];
            let matcher = eshop_api::query::Matcher::new(&filter);
            for d in &docs {
                let _ = matcher.matches(d);
            }
        }
    }
});
