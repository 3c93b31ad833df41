use blog_backend::storage::{
    MockStorageService, S3StorageClient, StorageService, photo_object_key,
};

#[cfg(test)]
mod key_tests {
    use super::*;

    #[test]
    fn test_key_is_scoped_to_owner_and_keeps_extension() {
        let key = photo_object_key(42, "holiday.JPG");
        assert!(key.starts_with("photos/42/"));
        assert!(key.ends_with(".JPG"));
    }

    #[test]
    fn test_key_ignores_client_path_segments() {
        let key = photo_object_key(7, "../../etc/passwd.png");
        assert!(!key.contains(".."));
        assert!(key.starts_with("photos/7/"));
        assert!(key.ends_with(".png"));
    }

    #[test]
    fn test_key_falls_back_to_bin() {
        assert!(photo_object_key(1, "no_extension").ends_with(".bin"));
        assert!(photo_object_key(1, "weird.p/ng").ends_with(".bin"));
    }

    #[test]
    fn test_keys_are_unique() {
        assert_ne!(photo_object_key(1, "a.jpg"), photo_object_key(1, "a.jpg"));
    }
}

#[cfg(test)]
mod mock_tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_success() {
        let mock = MockStorageService::new();
        let key = "photos/1/cake.jpg";
        let url = mock.presign_photo_upload(key, "image/jpeg").await.unwrap();

        assert!(url.contains("signature=fake"));
        assert!(url.contains(key));
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockStorageService::new_failing();
        let result = mock.presign_photo_upload("photos/1/cake.jpg", "image/jpeg").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mock_sanitization() {
        let mock = MockStorageService::new();
        let url = mock
            .presign_photo_upload("../../etc/passwd", "image/png")
            .await
            .unwrap();

        assert!(!url.contains(".."));
    }
}

#[cfg(test)]
mod s3_tests {
    use super::*;

    #[tokio::test]
    async fn test_s3_presigned_url_format() {
        // Presigning is a local computation; no server has to be listening.
        let client = S3StorageClient::new(
            "http://localhost:9000",
            "us-east-1",
            "testkey",
            "testsecret",
            "testbucket",
        )
        .await;

        let key = photo_object_key(3, "cover.webp");
        let url = client.presign_photo_upload(&key, "image/webp").await.unwrap();

        assert!(url.contains("localhost:9000"));
        assert!(url.contains("testbucket"));
        assert!(url.contains(&key));
        assert!(url.contains("X-Amz-Expires=600"));
    }
}
