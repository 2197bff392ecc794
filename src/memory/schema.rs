diesel::table! {
    memory_documents (username) {
        username -> Text,
        document -> Text,
        updated_at -> BigInt,
    }
}
