// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use snmp_bridge::{translate, Codec, Direction, TransformKind, TranslationRule, TranslationTable};

fuzz_target!(|data: &[u8]| {
    let codec = Codec::default();
    let Ok(packet) = codec.decode(data) else {
        return;
    };

    let table = TranslationTable::build(vec![
        TranslationRule::new("1.3.6.1.2.1.1.1.0", "1.3.6.1.4.1.1.1", TransformKind::Voltage),
        TranslationRule::new("1.3.6.1.2.1.1.3.0", "1.3.6.1.4.1.1.3", TransformKind::Temperature),
    ]);

    // Anything that decoded must re-encode after translation in either direction.
    for direction in [Direction::SourceToTarget, Direction::TargetToSource] {
        let (variables, _) = translate(&packet.variables, &table, direction);
        let twin = packet.twin(variables, packet.request_id);
        let bytes = codec.encode_packet(&twin).expect("decoded packet re-encodes");
        let again = codec.decode(&bytes).expect("encoded packet decodes");
        assert_eq!(again.variables, twin.variables);
    }
});
