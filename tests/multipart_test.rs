//! Multipart Upload Integration Tests
//!
//! ## Test Coverage
//!
//! - InitMulti and Multi discovery-or-create
//! - PutPart with SHA1 integrity header and ETag handling
//! - PutPartCopy with explicit and discovered content length
//! - ListParts / ListMulti pagination
//! - Complete part ordering and Abort

#[cfg(test)]
mod tests {
    use cos_client::cos::{AttemptStrategy, Bucket, Client, CosError, Part, Region};
    use cos_client::upload::multipart::Multi;
    use cos_client::upload::{Acl, CopyOptions, Options};
    use std::io::Cursor;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Helper function to create a bucket handle pointing to a mock server
    fn create_test_bucket(mock_server: &MockServer) -> Bucket {
        let mut client = Client::new(
            Region::SHANGHAI,
            "1250000000",
            "test-secret-id",
            "test-secret-key",
            false,
            false,
        )
        .unwrap()
        .with_attempt_strategy(AttemptStrategy::new(
            2,
            Duration::ZERO,
            Duration::from_millis(10),
        ));
        client
            .set_endpoint(&mock_server.address().to_string())
            .unwrap();
        client.bucket("charts")
    }

    async fn mount_init(mock_server: &MockServer, key: &str, upload_id: &str) {
        Mock::given(method("POST"))
            .and(path(format!("/{}", key)))
            .and(query_param("uploads", ""))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
                <InitiateMultipartUploadResult>
                    <Bucket>charts-1250000000</Bucket>
                    <Key>{}</Key>
                    <UploadId>{}</UploadId>
                </InitiateMultipartUploadResult>"#,
                key, upload_id
            )))
            .expect(1)
            .mount(mock_server)
            .await;
    }

    // ========================================================================
    // TEST: Session setup
    // ========================================================================

    #[tokio::test]
    async fn test_init_multi_returns_upload_id() {
        let mock_server = MockServer::start().await;
        mount_init(&mock_server, "big.tgz", "upload-123").await;

        let bucket = create_test_bucket(&mock_server);
        let multi = bucket
            .init_multi("big.tgz", "application/gzip", Acl::Inherit, &Options::default())
            .await
            .unwrap();

        assert_eq!(multi.upload_id(), "upload-123");
        assert_eq!(multi.key(), "big.tgz");

        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(
            requests[0].headers.get("content-type").unwrap(),
            "application/gzip"
        );
        let query = requests[0].url.query().unwrap();
        assert!(!query.contains("uploads="));
        assert!(query.contains("q-url-param-list=uploads"));
    }

    #[tokio::test]
    async fn test_multi_resumes_existing_upload() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("uploads", ""))
            .and(query_param("prefix", "big.tgz"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<ListMultipartUploadsResult>
                    <IsTruncated>false</IsTruncated>
                    <Upload><Key>big.tgz.old</Key><UploadId>other</UploadId></Upload>
                    <Upload><Key>big.tgz</Key><UploadId>existing-id</UploadId></Upload>
                </ListMultipartUploadsResult>"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let bucket = create_test_bucket(&mock_server);
        let multi = bucket
            .multi("big.tgz", "application/gzip", Acl::Inherit, &Options::default())
            .await
            .unwrap();

        assert_eq!(multi.upload_id(), "existing-id");
    }

    #[tokio::test]
    async fn test_multi_treats_no_such_upload_as_empty() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("uploads", ""))
            .respond_with(ResponseTemplate::new(404).set_body_string(
                "<Error><Code>NoSuchUpload</Code><Message>gone</Message></Error>",
            ))
            .mount(&mock_server)
            .await;
        mount_init(&mock_server, "big.tgz", "fresh-id").await;

        let bucket = create_test_bucket(&mock_server);
        let multi = bucket
            .multi("big.tgz", "application/gzip", Acl::Inherit, &Options::default())
            .await
            .unwrap();

        assert_eq!(multi.upload_id(), "fresh-id");
    }

    #[tokio::test]
    async fn test_list_multi_follows_pages() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("uploads", ""))
            .and(query_param("key-marker", "b.tgz"))
            .and(query_param("upload-id-marker", "id-b"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<ListMultipartUploadsResult>
                    <IsTruncated>false</IsTruncated>
                    <Upload><Key>c.tgz</Key><UploadId>id-c</UploadId></Upload>
                    <CommonPrefixes><Prefix>old/</Prefix></CommonPrefixes>
                </ListMultipartUploadsResult>"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("uploads", ""))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<ListMultipartUploadsResult>
                    <IsTruncated>true</IsTruncated>
                    <NextKeyMarker>b.tgz</NextKeyMarker>
                    <NextUploadIdMarker>id-b</NextUploadIdMarker>
                    <Upload><Key>a.tgz</Key><UploadId>id-a</UploadId></Upload>
                    <Upload><Key>b.tgz</Key><UploadId>id-b</UploadId></Upload>
                </ListMultipartUploadsResult>"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let bucket = create_test_bucket(&mock_server);
        let (multis, prefixes) = bucket.list_multi("", "/").await.unwrap();

        let ids: Vec<_> = multis.iter().map(|m| m.upload_id()).collect();
        assert_eq!(ids, vec!["id-a", "id-b", "id-c"]);
        assert_eq!(prefixes, vec!["old/"]);
    }

    #[tokio::test]
    async fn test_init_multi_without_upload_id_is_decode_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/big.tgz"))
            .and(query_param("uploads", ""))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<InitiateMultipartUploadResult><Key>big.tgz</Key></InitiateMultipartUploadResult>",
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let bucket = create_test_bucket(&mock_server);
        let err = bucket
            .init_multi("big.tgz", "application/gzip", Acl::Inherit, &Options::default())
            .await
            .unwrap_err();

        assert!(matches!(err, CosError::XmlDecode(_)));
    }

    #[tokio::test]
    async fn test_list_multi_stops_when_marker_is_missing() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("uploads", ""))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<ListMultipartUploadsResult>
                    <IsTruncated>true</IsTruncated>
                    <Upload><Key>a.tgz</Key><UploadId>id-a</UploadId></Upload>
                </ListMultipartUploadsResult>"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let bucket = create_test_bucket(&mock_server);
        let err = bucket.list_multi("", "").await.unwrap_err();

        assert!(matches!(err, CosError::StalledListing { .. }));
    }

    // ========================================================================
    // TEST: Parts
    // ========================================================================

    #[tokio::test]
    async fn test_put_part_sends_sha1_and_returns_etag() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/big.tgz"))
            .and(query_param("uploadId", "upload-123"))
            .and(query_param("partNumber", "1"))
            .and(header("x-cos-content-sha1", "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"))
            .and(header("content-length", "11"))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"etag-1\""))
            .expect(1)
            .mount(&mock_server)
            .await;

        let bucket = create_test_bucket(&mock_server);
        let multi = Multi::new(bucket, "big.tgz", "upload-123");
        let part = multi
            .put_part(1, Cursor::new(b"hello world".to_vec()))
            .await
            .unwrap();

        assert_eq!(part, Part::new(1, "\"etag-1\"", 11));
    }

    #[tokio::test]
    async fn test_put_part_without_etag_fails() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/big.tgz"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let bucket = create_test_bucket(&mock_server);
        let multi = Multi::new(bucket, "big.tgz", "upload-123");
        let err = multi
            .put_part_with_timeout(1, Cursor::new(vec![1u8; 16]), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, CosError::MissingETag));
    }

    #[tokio::test]
    async fn test_put_part_copy_with_content_length() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/big.tgz"))
            .and(query_param("uploadId", "upload-123"))
            .and(query_param("partNumber", "2"))
            .and(header("x-cos-copy-source", "/charts-1250000000/src.tgz"))
            .and(header("x-cos-copy-source-range", "bytes=0-99"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<CopyPartResult><ETag>"copy-etag"</ETag><LastModified>2017-06-23T12:33:26Z</LastModified></CopyPartResult>"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let bucket = create_test_bucket(&mock_server);
        let multi = Multi::new(bucket, "big.tgz", "upload-123");
        let options = CopyOptions {
            copy_source_range: Some("bytes=0-99".into()),
            ..CopyOptions::default()
        };
        let (result, part) = multi
            .put_part_copy_with_content_length(2, &options, "/charts-1250000000/src.tgz", Some(100))
            .await
            .unwrap();

        assert_eq!(result.etag, "\"copy-etag\"");
        assert_eq!(part, Part::new(2, "\"copy-etag\"", 100));
    }

    #[tokio::test]
    async fn test_put_part_copy_discovers_length_with_head() {
        let mock_server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/src.tgz"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/big.tgz"))
            .and(query_param("partNumber", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<CopyPartResult><ETag>"copy-etag"</ETag></CopyPartResult>"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let bucket = create_test_bucket(&mock_server);
        let multi = Multi::new(bucket, "big.tgz", "upload-123");
        let (_, part) = multi
            .put_part_copy(1, &CopyOptions::default(), "/other-1250000000/src.tgz")
            .await
            .unwrap();

        assert_eq!(part.n, 1);
        assert_eq!(part.etag, "\"copy-etag\"");
    }

    #[tokio::test]
    async fn test_list_parts_pages_and_sorts() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/big.tgz"))
            .and(query_param("uploadId", "upload-123"))
            .and(query_param("max-parts", "1000"))
            .and(query_param("part-number-marker", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<ListPartsResult>
                    <IsTruncated>true</IsTruncated>
                    <NextPartNumberMarker>3</NextPartNumberMarker>
                    <Part><PartNumber>3</PartNumber><ETag>"c"</ETag><Size>3</Size></Part>
                    <Part><PartNumber>1</PartNumber><ETag>"a"</ETag><Size>1</Size></Part>
                </ListPartsResult>"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/big.tgz"))
            .and(query_param("part-number-marker", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<ListPartsResult>
                    <IsTruncated>false</IsTruncated>
                    <Part><PartNumber>2</PartNumber><ETag>"b"</ETag><Size>2</Size></Part>
                </ListPartsResult>"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let bucket = create_test_bucket(&mock_server);
        let multi = Multi::new(bucket, "big.tgz", "upload-123");
        let parts = multi.list_parts().await.unwrap();

        let numbers: Vec<u32> = parts.iter().map(|p| p.n).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(parts[1].etag, "\"b\"");
    }

    #[tokio::test]
    async fn test_list_parts_stops_when_marker_does_not_advance() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/big.tgz"))
            .and(query_param("uploadId", "upload-123"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<ListPartsResult>
                    <IsTruncated>true</IsTruncated>
                    <NextPartNumberMarker>0</NextPartNumberMarker>
                    <Part><PartNumber>1</PartNumber><ETag>"a"</ETag><Size>1</Size></Part>
                </ListPartsResult>"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let bucket = create_test_bucket(&mock_server);
        let multi = Multi::new(bucket, "big.tgz", "upload-123");
        let err = multi.list_parts().await.unwrap_err();

        match err {
            CosError::StalledListing { marker } => assert_eq!(marker, "0"),
            other => panic!("expected stalled listing, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_parts_full_caps_page_size() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/big.tgz"))
            .and(query_param("max-parts", "1000"))
            .and(query_param("part-number-marker", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<ListPartsResult><IsTruncated>false</IsTruncated></ListPartsResult>",
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let bucket = create_test_bucket(&mock_server);
        let multi = Multi::new(bucket, "big.tgz", "upload-123");
        let parts = multi.list_parts_full(5, 5000).await.unwrap();
        assert!(parts.is_empty());
    }

    // ========================================================================
    // TEST: Completion
    // ========================================================================

    #[tokio::test]
    async fn test_round_trip_completes_with_sorted_parts() {
        let mock_server = MockServer::start().await;
        mount_init(&mock_server, "big.tgz", "upload-rt").await;

        Mock::given(method("PUT"))
            .and(path("/big.tgz"))
            .and(query_param("partNumber", "1"))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"e1\""))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/big.tgz"))
            .and(query_param("partNumber", "2"))
            .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"e2\""))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/big.tgz"))
            .and(query_param("uploadId", "upload-rt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<CompleteMultipartUploadResult><ETag>\"final\"</ETag></CompleteMultipartUploadResult>",
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let bucket = create_test_bucket(&mock_server);
        let multi = bucket
            .init_multi("big.tgz", "application/gzip", Acl::Private, &Options::default())
            .await
            .unwrap();

        // Upload out of order
        let second = multi.put_part(2, Cursor::new(b"world".to_vec())).await.unwrap();
        let first = multi.put_part(1, Cursor::new(b"hello ".to_vec())).await.unwrap();
        multi.complete(&[second, first]).await.unwrap();

        let requests = mock_server.received_requests().await.unwrap();
        let complete = requests
            .iter()
            .find(|r| r.method.as_str() == "POST" && r.url.query().is_some_and(|q| q.contains("uploadId")))
            .unwrap();
        let body = String::from_utf8(complete.body.clone()).unwrap();

        let one = body.find("<PartNumber>1</PartNumber>").unwrap();
        let two = body.find("<PartNumber>2</PartNumber>").unwrap();
        assert!(body.starts_with("<CompleteMultipartUpload>"));
        assert!(one < two);
        assert_eq!(
            complete.headers.get("content-length").unwrap().to_str().unwrap(),
            body.len().to_string()
        );

        let init = &requests[0];
        assert_eq!(init.headers.get("x-cos-acl").unwrap(), "private");
    }

    #[tokio::test]
    async fn test_complete_rejects_empty_part_list() {
        let mock_server = MockServer::start().await;
        let bucket = create_test_bucket(&mock_server);
        let multi = Multi::new(bucket, "big.tgz", "upload-123");

        let err = multi.complete(&[]).await.unwrap_err();
        assert!(matches!(err, CosError::InvalidArgument(_)));
        assert!(mock_server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_abort() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/big.tgz"))
            .and(query_param("uploadId", "upload-123"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let bucket = create_test_bucket(&mock_server);
        let multi = Multi::new(bucket, "big.tgz", "upload-123");
        multi.abort().await.unwrap();
    }
}
