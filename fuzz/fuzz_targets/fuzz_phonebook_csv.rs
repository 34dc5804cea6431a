#![no_main]
use exchange_traits::PhonebookLookup;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(pb) = exchange_config::parse_phonebook_csv(data) {
        // Every accepted number must be digits only and resolvable.
        for number in pb.numbers() {
            assert!(!number.is_empty() && number.bytes().all(|b| b.is_ascii_digit()));
            assert!(pb.find(&number).is_some());
        }
    }
});
