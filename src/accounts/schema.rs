diesel::table! {
    users (username) {
        username -> Text,
        password_hash -> Text,
        role -> Text,
        created_at -> BigInt,
    }
}

diesel::table! {
    sessions (token) {
        token -> Text,
        username -> Text,
        role -> Text,
        created_at -> BigInt,
        expires_at -> BigInt,
    }
}
