// Diesel table definitions matching migrations/.

diesel::table! {
    competitions (id) {
        id -> Text,
        account -> Text,
        name -> Text,
        info -> Text,
        banner -> Text,
        closing_datetime -> Text,
        amount_tickets -> BigInt,
        sold -> BigInt,
        min_bet -> BigInt,
        max_bet -> BigInt,
        choices -> Text,
        winning_choice -> BigInt,
        state -> Text,
        version -> BigInt,
        time -> Text,
    }
}

diesel::table! {
    tickets (id) {
        id -> Text,
        account -> Text,
        competition -> Text,
        amount -> BigInt,
        choice -> BigInt,
        reward_target -> Text,
        reward_msat -> BigInt,
        reward_failure -> Nullable<Text>,
        reward_payment_hash -> Nullable<Text>,
        state -> Text,
        time -> Text,
        claimed_at -> Nullable<Text>,
    }
}

diesel::table! {
    payout_queue (seq) {
        seq -> BigInt,
        ticket_id -> Text,
        enqueued_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(competitions, tickets, payout_queue);
