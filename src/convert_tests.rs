#[cfg(test)]
mod tests {
    use crate::convert::{convert, convert_with_options, ConvertOptions};
    use crate::error::{ErrorKind, ERR_UNRESOLVED_VARIABLE};
    use crate::metadata::ComponentMetadata;
    use serde_json::json;

    fn metadata(value: serde_json::Value) -> ComponentMetadata {
        ComponentMetadata::from_json_str(&value.to_string()).unwrap()
    }

    fn component(template: &str) -> String {
        format!(
            "import {{ LitElement, html }} from 'lit';\n\nexport class Card extends LitElement {{\n  render() {{\n    return html`{}`;\n  }}\n}}\n",
            template
        )
    }

    fn card(parameters: serde_json::Value) -> ComponentMetadata {
        metadata(json!({ "name": "Card", "parameters": parameters }))
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // SCENARIOS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_simple_field() {
        let out = convert(
            &component("<div>${this.title}</div>"),
            &card(json!([{ "name": "title", "escape": "html" }])),
        )
        .unwrap();
        assert_eq!(out, "<div><?php echo esc_html( $title ); ?></div>");
    }

    #[test]
    fn test_conditional_with_markup() {
        let out = convert(
            &component("${this.hasImage ? html`<img>` : html`<div></div>`}"),
            &card(json!([{ "name": "hasImage", "type": "boolean" }])),
        )
        .unwrap();
        assert_eq!(
            out,
            "<?php if ( $hasImage ) : ?><img><?php else : ?><div></div><?php endif; ?>"
        );
    }

    #[test]
    fn test_loop() {
        let meta = metadata(json!({
            "name": "List",
            "arrayFields": { "items": [{ "name": "name", "escape": "html" }] }
        }));
        let out = convert(
            &component("<ul>${this.items.map(item => html`<li>${item.name}</li>`)}</ul>"),
            &meta,
        )
        .unwrap();
        assert_eq!(
            out,
            "<ul><?php foreach ( $items as $item ) : ?><li><?php echo esc_html( $item['name'] ); ?></li><?php endforeach; ?></ul>"
        );
    }

    #[test]
    fn test_unknown_field_lists_parameters() {
        let err = convert(
            &component("<p>${this.unknownField}</p>"),
            &card(json!([
                { "name": "title", "escape": "html" },
                { "name": "subtitle", "escape": "html" }
            ])),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnresolvedVariableError);
        assert_eq!(err.code, ERR_UNRESOLVED_VARIABLE);
        assert_eq!(err.subject.as_deref(), Some("unknownField"));
        assert_eq!(err.visible_names, vec!["subtitle", "title"]);
        assert!(err.message.contains("render()"));
        assert!(err.message.contains("subtitle, title"));
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // ATTRIBUTES AND ENCODING
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_attribute_position_overrides_declaration() {
        let out = convert(
            &component(r#"<a href="${this.link}" class="${this.tone}">${this.label}</a>"#),
            &card(json!([
                { "name": "link", "escape": "html" },
                { "name": "tone" },
                { "name": "label", "escape": "html" }
            ])),
        )
        .unwrap();
        assert_eq!(
            out,
            r#"<a href="<?php echo esc_url( $link ); ?>" class="<?php echo esc_attr( $tone ); ?>"><?php echo esc_html( $label ); ?></a>"#
        );
    }

    #[test]
    fn test_src_and_action_are_urls() {
        let out = convert(
            &component(r#"<img src=${this.image}><form action='${this.target}'></form>"#),
            &card(json!([{ "name": "image" }, { "name": "target" }])),
        )
        .unwrap();
        assert_eq!(
            out,
            "<img src=<?php echo esc_url( $image ); ?>><form action='<?php echo esc_url( $target ); ?>'></form>"
        );
    }

    #[test]
    fn test_declared_script_and_raw() {
        let out = convert(
            &component("<script>var c = '${this.config}';</script><div>${this.body}</div>"),
            &card(json!([
                { "name": "config", "escape": "js" },
                { "name": "body", "escape": "none" }
            ])),
        )
        .unwrap();
        assert_eq!(
            out,
            "<script>var c = '<?php echo esc_js( $config ); ?>';</script><div><?php echo $body; ?></div>"
        );
    }

    #[test]
    fn test_missing_escape_names_metadata_path() {
        let err = convert(
            &component("<p>${this.flag}</p>"),
            &card(json!([{ "name": "flag", "type": "string" }])),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingEscapeMetadataError);
        assert_eq!(err.component, "Card");
        assert_eq!(err.subject.as_deref(), Some("flag"));
        assert_eq!(
            err.metadata_path.as_deref(),
            Some("parameters[name=\"flag\"].escape")
        );
    }

    #[test]
    fn test_missing_item_escape_names_array_path() {
        let meta = metadata(json!({
            "name": "List",
            "arrayFields": { "items": [{ "name": "name" }] }
        }));
        let err = convert(
            &component("${this.items.map(item => html`<li>${item.name}</li>`)}"),
            &meta,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingEscapeMetadataError);
        assert_eq!(
            err.metadata_path.as_deref(),
            Some("arrayFields.items[name=\"name\"].escape")
        );
    }

    #[test]
    fn test_compound_echo_shares_one_encoding() {
        let out = convert(
            &component("<h1>${this.first + ' ' + this.last}</h1>"),
            &card(json!([
                { "name": "first", "escape": "html" },
                { "name": "last", "escape": "html" }
            ])),
        )
        .unwrap();
        assert_eq!(
            out,
            "<h1><?php echo esc_html( ( $first . ' ' ) . $last ); ?></h1>"
        );
    }

    #[test]
    fn test_compound_echo_with_mixed_policies_fails() {
        let err = convert(
            &component("<h1>${this.first + this.link}</h1>"),
            &card(json!([
                { "name": "first", "escape": "html" },
                { "name": "link", "escape": "url" }
            ])),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedConstructError);
        assert!(err.message.contains("esc_html"));
        assert!(err.message.contains("esc_url"));
    }

    #[test]
    fn test_fallback_keeps_the_operand_value() {
        let meta = card(json!([
            { "name": "subtitle", "type": "string", "escape": "html" },
            { "name": "label", "type": "string", "escape": "html" }
        ]));
        let out = convert(&component("<h2>${this.subtitle || 'Untitled'}</h2>"), &meta).unwrap();
        assert_eq!(out, "<h2><?php echo esc_html( $subtitle ?: 'Untitled' ); ?></h2>");

        let out = convert(&component("<h2>${this.subtitle && this.label}</h2>"), &meta).unwrap();
        assert_eq!(
            out,
            "<h2><?php echo esc_html( $subtitle ? $label : $subtitle ); ?></h2>"
        );

        let out = convert(&component("<h2>${this.subtitle ?? 'Untitled'}</h2>"), &meta).unwrap();
        assert_eq!(out, "<h2><?php echo esc_html( $subtitle ?? 'Untitled' ); ?></h2>");
    }

    #[test]
    fn test_string_typed_fields_concatenate() {
        let out = convert(
            &component("<h1>${this.first + this.last}</h1>"),
            &card(json!([
                { "name": "first", "type": "string", "escape": "html" },
                { "name": "last", "type": "string", "escape": "html" }
            ])),
        )
        .unwrap();
        assert_eq!(out, "<h1><?php echo esc_html( $first . $last ); ?></h1>");

        let out = convert(
            &component("<b>${this.price + this.tax}</b>"),
            &card(json!([
                { "name": "price", "type": "number", "escape": "html" },
                { "name": "tax", "type": "number", "escape": "html" }
            ])),
        )
        .unwrap();
        assert_eq!(out, "<b><?php echo esc_html( $price + $tax ); ?></b>");
    }

    #[test]
    fn test_string_typed_item_fields_concatenate() {
        let meta = metadata(json!({
            "name": "People",
            "arrayFields": {
                "people": [
                    { "name": "first", "type": "string", "escape": "html" },
                    { "name": "last", "type": "string", "escape": "html" }
                ]
            }
        }));
        let out = convert(
            &component("${this.people.map(person => html`<li>${person.first + person.last}</li>`)}"),
            &meta,
        )
        .unwrap();
        assert_eq!(
            out,
            "<?php foreach ( $people as $person ) : ?><li><?php echo esc_html( $person['first'] . $person['last'] ); ?></li><?php endforeach; ?>"
        );
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // BLOCKS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_empty_alternate_omits_else() {
        let out = convert(
            &component("${this.on ? html`<b>on</b>` : ''}"),
            &card(json!([{ "name": "on", "type": "boolean" }])),
        )
        .unwrap();
        assert_eq!(out, "<?php if ( $on ) : ?><b>on</b><?php endif; ?>");
    }

    #[test]
    fn test_guarded_fragment() {
        let out = convert(
            &component("${this.badge && html`<em>${this.badge}</em>`}"),
            &card(json!([{ "name": "badge", "escape": "html" }])),
        )
        .unwrap();
        assert_eq!(
            out,
            "<?php if ( $badge ) : ?><em><?php echo esc_html( $badge ); ?></em><?php endif; ?>"
        );
    }

    #[test]
    fn test_condition_with_comparison_and_string_literal() {
        let out = convert(
            &component(
                r#"${this.mode === "it's" ? html`<i>${this.count}</i>` : html`<i>none</i>`}"#,
            ),
            &card(json!([
                { "name": "mode" },
                { "name": "count", "type": "number", "escape": "html" }
            ])),
        )
        .unwrap();
        assert_eq!(
            out,
            "<?php if ( $mode === 'it\\'s' ) : ?><i><?php echo esc_html( $count ); ?></i><?php else : ?><i>none</i><?php endif; ?>"
        );
    }

    #[test]
    fn test_nested_ternary_in_condition_stays_native() {
        let out = convert(
            &component("${(this.a ? this.b : this.c) ? html`x` : html`y`}"),
            &card(json!([{ "name": "a" }, { "name": "b" }, { "name": "c" }])),
        )
        .unwrap();
        assert_eq!(
            out,
            "<?php if ( ( $a ? $b : $c ) ) : ?>x<?php else : ?>y<?php endif; ?>"
        );
    }

    #[test]
    fn test_condition_string_with_colon() {
        let out = convert(
            &component("${this.mode === 'a:b' ? html`x` : ''}"),
            &card(json!([{ "name": "mode" }])),
        )
        .unwrap();
        assert_eq!(out, "<?php if ( $mode === 'a:b' ) : ?>x<?php endif; ?>");
    }

    #[test]
    fn test_condition_keeps_boolean_operators() {
        let out = convert(
            &component("${this.a || this.b ? html`x` : ''}${this.a && !this.b ? html`y` : ''}"),
            &card(json!([{ "name": "a" }, { "name": "b" }])),
        )
        .unwrap();
        assert_eq!(
            out,
            "<?php if ( $a || $b ) : ?>x<?php endif; ?><?php if ( $a && !$b ) : ?>y<?php endif; ?>"
        );
    }

    #[test]
    fn test_nested_loops_resolve_inner_array() {
        let meta = metadata(json!({
            "name": "Blog",
            "arrayFields": {
                "posts": [{ "name": "title", "escape": "html" }, { "name": "tags", "type": "array" }],
                "tags": [{ "name": "tag", "escape": "html" }]
            }
        }));
        let out = convert(
            &component(
                "${this.posts.map(post => html`<h2>${post.title}</h2>${post.tags.map(tag => html`<span>${tag}</span>`)}`)}",
            ),
            &meta,
        )
        .unwrap();
        assert_eq!(
            out,
            "<?php foreach ( $posts as $post ) : ?><h2><?php echo esc_html( $post['title'] ); ?></h2>\
             <?php foreach ( $post['tags'] as $tag ) : ?><span><?php echo esc_html( $tag ); ?></span><?php endforeach; ?>\
             <?php endforeach; ?>"
        );
    }

    #[test]
    fn test_loop_index() {
        let meta = metadata(json!({
            "name": "List",
            "arrayFields": { "items": [{ "name": "name", "escape": "html" }] }
        }));
        let out = convert(
            &component(
                r#"${this.items.map((item, i) => html`<li data-index="${i}">${i + 1}. ${item.name}</li>`)}"#,
            ),
            &meta,
        )
        .unwrap();
        assert_eq!(
            out,
            r#"<?php foreach ( $items as $i => $item ) : ?><li data-index="<?php echo (int) $i; ?>"><?php echo $i + 1; ?>. <?php echo esc_html( $item['name'] ); ?></li><?php endforeach; ?>"#
        );
    }

    #[test]
    fn test_loop_variable_not_visible_after_loop() {
        let meta = metadata(json!({
            "name": "List",
            "arrayFields": { "items": [{ "name": "name", "escape": "html" }] }
        }));
        let err = convert(
            &component("${this.items.map(item => html`<li></li>`)}${item}"),
            &meta,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnresolvedVariableError);
        assert_eq!(err.visible_names, vec!["items"]);
    }

    #[test]
    fn test_this_member_ignores_loop_bindings() {
        let meta = metadata(json!({
            "name": "List",
            "arrayFields": { "items": [{ "name": "name", "escape": "html" }] }
        }));
        let err = convert(
            &component("${this.items.map(item => html`<li>${this.item}</li>`)}"),
            &meta,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnresolvedVariableError);
        assert_eq!(err.subject.as_deref(), Some("item"));
        assert_eq!(err.visible_names, vec!["items"]);
    }

    #[test]
    fn test_loop_variable_cannot_shadow_visible_name() {
        let meta = metadata(json!({
            "name": "List",
            "parameters": [{ "name": "title", "escape": "html" }],
            "arrayFields": { "items": [{ "name": "name", "escape": "html" }] }
        }));
        for template in [
            "${this.items.map(title => html`<li>${title.name}</li>`)}",
            "${this.items.map((item, title) => html`<li>${item.name}</li>`)}",
            "${this.items.map(item => html`${this.items.map(item => html`<li></li>`)}`)}",
        ] {
            let err = convert(&component(template), &meta).unwrap_err();
            assert_eq!(err.kind, ErrorKind::UnsupportedConstructError, "{}", template);
            assert!(err.message.contains("shadows"), "{}", err.message);
        }
    }

    #[test]
    fn test_item_field_outside_loop() {
        let err = convert(
            &component("<p>${item.name}</p>"),
            &card(json!([{ "name": "title", "escape": "html" }])),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingLoopContextError);
        assert_eq!(err.subject.as_deref(), Some("item.name"));
    }

    #[test]
    fn test_length_becomes_count() {
        let meta = metadata(json!({
            "name": "List",
            "arrayFields": { "items": [{ "name": "name", "escape": "html" }] }
        }));
        let out = convert(
            &component("<p>${this.items.length} items</p>${this.items.length > 0 ? html`<hr>` : ''}"),
            &meta,
        )
        .unwrap();
        assert_eq!(
            out,
            "<p><?php echo count( $items ); ?> items</p><?php if ( count( $items ) > 0 ) : ?><hr><?php endif; ?>"
        );
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // HELPERS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_pluralize() {
        let meta = metadata(json!({
            "name": "Reviews",
            "textDomain": "shop",
            "arrayFields": { "reviews": [{ "name": "author", "escape": "html" }] }
        }));
        let out = convert(
            &component("<p>${this.pluralize(this.reviews.length, 'review')}</p>"),
            &meta,
        )
        .unwrap();
        assert_eq!(
            out,
            "<p><?php echo esc_html( sprintf( _n( '%d review', '%d reviews', count( $reviews ), 'shop' ), count( $reviews ) ) ); ?></p>"
        );
    }

    #[test]
    fn test_render_stars_reads_current_item() {
        let meta = metadata(json!({
            "name": "Reviews",
            "arrayFields": { "reviews": [{ "name": "rating", "type": "number" }] }
        }));
        let out = convert(
            &component("${this.reviews.map(review => html`<li>${this.renderStars()}</li>`)}"),
            &meta,
        )
        .unwrap();
        assert_eq!(
            out,
            "<?php foreach ( $reviews as $review ) : ?><li>\
             <?php for ( $star = 1; $star <= 5; $star++ ) : ?>\
             <span class=\"star<?php echo $star <= (int) $review['rating'] ? ' is-filled' : ''; ?>\" aria-hidden=\"true\">&#9733;</span>\
             <?php endfor; ?></li><?php endforeach; ?>"
        );
    }

    #[test]
    fn test_render_stars_outside_loop() {
        let err = convert(&component("${this.renderStars()}"), &card(json!([]))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingLoopContextError);
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // LITERAL PHP MARKERS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_hand_written_php_blocks_pass_through() {
        let out = convert(
            &component("<div><?php if ( is_user_logged_in() ) : ?>${this.title}<?php endif; ?></div>"),
            &card(json!([{ "name": "title", "escape": "html" }])),
        )
        .unwrap();
        assert_eq!(
            out,
            "<div><?php if ( is_user_logged_in() ) : ?><?php echo esc_html( $title ); ?><?php endif; ?></div>"
        );
    }

    #[test]
    fn test_interpolation_inside_open_php_region_is_bare() {
        let out = convert(
            &component("<?php $heading = ${this.title}; ?><h1><?php echo esc_html( $heading ); ?></h1>"),
            &card(json!([{ "name": "title", "escape": "html" }])),
        )
        .unwrap();
        assert_eq!(
            out,
            "<?php $heading = $title; ?><h1><?php echo esc_html( $heading ); ?></h1>"
        );
    }

    #[test]
    fn test_hand_written_foreach_binds_item() {
        let meta = metadata(json!({
            "name": "List",
            "arrayFields": { "items": [{ "name": "name", "escape": "html" }] }
        }));
        let out = convert(
            &component("<?php foreach ( $items as $item ) : ?>${item.name}<?php endforeach; ?>"),
            &meta,
        )
        .unwrap();
        assert_eq!(
            out,
            "<?php foreach ( $items as $item ) : ?><?php echo esc_html( $item['name'] ); ?><?php endforeach; ?>"
        );
    }

    #[test]
    fn test_stray_endif_is_imbalance() {
        let err = convert(&component("<div><?php endif; ?></div>"), &card(json!([]))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ScopeImbalanceError);
    }

    #[test]
    fn test_unclosed_php_region_is_imbalance() {
        let err = convert(&component("<div><?php echo 1;"), &card(json!([]))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ScopeImbalanceError);
    }

    #[test]
    fn test_branch_cannot_close_outer_block() {
        let err = convert(
            &component("<?php if ( $x ) : ?>${this.on ? html`<?php endif; ?>` : ''}"),
            &card(json!([{ "name": "on" }])),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ScopeImbalanceError);
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // LITERALS AND UNSUPPORTED CONSTRUCTS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_literals_render_as_markup() {
        let out = convert(
            &component("<p>${5} ${'a < b'} ${undefined}${null}</p>"),
            &card(json!([])),
        )
        .unwrap();
        assert_eq!(out, "<p>5 a < b </p>");
    }

    #[test]
    fn test_boolean_in_markup_is_unsupported() {
        let err = convert(&component("<p>${true}</p>"), &card(json!([]))).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedConstructError);
    }

    #[test]
    fn test_unsupported_constructs() {
        let meta = card(json!([
            { "name": "items", "escape": "html" },
            { "name": "title", "escape": "html" }
        ]));
        for template in [
            "${this.items.filter(x => x)}",
            "${typeof this.title}",
            "${this.items[0]}",
            "${this.title?.trim()}",
            "${`plain ${this.title}`}",
            "${[this.title]}",
        ] {
            let err = convert(&component(template), &meta).unwrap_err();
            assert_eq!(
                err.kind,
                ErrorKind::UnsupportedConstructError,
                "expected unsupported for {}",
                template
            );
            assert!(err.message.contains("render()"), "{}", err.message);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // ENTRY POINT AND OPTIONS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_custom_entry_point() {
        let meta = metadata(json!({
            "name": "Card",
            "entryPoint": "template",
            "parameters": [{ "name": "title", "escape": "html" }]
        }));
        let source = "class Card { render() { return html`<p>skip</p>`; } template() { return html`<b>${this.title}</b>`; } }";
        assert_eq!(
            convert(source, &meta).unwrap(),
            "<b><?php echo esc_html( $title ); ?></b>"
        );
    }

    #[test]
    fn test_bare_render_method() {
        let source = "render() {\n  return html`<p>${this.title}</p>`;\n}";
        let out = convert(source, &card(json!([{ "name": "title", "escape": "html" }]))).unwrap();
        assert_eq!(out, "<p><?php echo esc_html( $title ); ?></p>");
    }

    #[test]
    fn test_prelude_option() {
        let meta = card(json!([{ "name": "title", "type": "string", "default": "Hi", "escape": "html" }]));
        let out = convert_with_options(
            &component("<p>${this.title}</p>"),
            &meta,
            ConvertOptions {
                include_prelude: true,
                verify_markers: true,
            },
        )
        .unwrap();
        assert_eq!(
            out,
            "<?php\n$title = isset( $attributes['title'] ) ? $attributes['title'] : 'Hi';\n?>\n<p><?php echo esc_html( $title ); ?></p>"
        );
    }

    #[test]
    fn test_error_serializes_to_json() {
        let err = convert(&component("${this.nope}"), &card(json!([]))).unwrap_err();
        let value: serde_json::Value = serde_json::from_str(&err.to_json()).unwrap();
        assert_eq!(value["kind"], "UnresolvedVariableError");
        assert_eq!(value["code"], ERR_UNRESOLVED_VARIABLE);
        assert_eq!(value["component"], "Card");
        assert_eq!(value["visibleNames"], json!([]));
    }
}
